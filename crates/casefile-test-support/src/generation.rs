//! Test backends — scripted and failing `TextGenerator` and
//! `ArtifactProducer` implementations.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use casefile_core::error::DomainError;
use casefile_core::generation::{
    Artifact, ArtifactProducer, GenerationRequest, GenerationRole, TextGenerator,
};

/// A generator that replays a fixed queue of results in order and records
/// every request. Fails with an upstream error once the queue is exhausted.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, DomainError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    /// Create a generator that answers with `script`, one entry per call.
    #[must_use]
    pub fn new(script: Vec<Result<String, DomainError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all requests received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, DomainError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DomainError::Upstream("script exhausted".into())))
    }
}

/// A generator that answers every call of a role with the same text.
///
/// Roles without a configured answer fail with an upstream error.
#[derive(Debug, Default)]
pub struct RoleGenerator {
    answers: HashMap<GenerationRole, String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl RoleGenerator {
    /// Create a generator with no configured answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the answer for a role.
    #[must_use]
    pub fn with(mut self, role: GenerationRole, answer: impl Into<String>) -> Self {
        self.answers.insert(role, answer.into());
        self
    }

    /// Number of calls received for a role.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self, role: GenerationRole) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.role == role)
            .count()
    }

    /// Returns a snapshot of all requests received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for RoleGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, DomainError> {
        self.requests.lock().unwrap().push(request.clone());
        self.answers
            .get(&request.role)
            .cloned()
            .ok_or_else(|| DomainError::Upstream(format!("no answer for {}", request.role)))
    }
}

/// A generator whose every call fails with an upstream error.
#[derive(Debug)]
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, DomainError> {
        Err(DomainError::Upstream("backend unavailable".into()))
    }
}

/// An image producer that always returns the same bytes.
#[derive(Debug)]
pub struct StaticImageProducer {
    bytes: Vec<u8>,
}

impl StaticImageProducer {
    /// Create a producer returning `bytes` as `image/png`.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl ArtifactProducer for StaticImageProducer {
    async fn produce(&self, _tags: &[String], _keyword: &str) -> Result<Artifact, DomainError> {
        Ok(Artifact {
            bytes: self.bytes.clone(),
            content_type: "image/png".to_owned(),
        })
    }
}

/// An image producer whose every call fails with an upstream error.
#[derive(Debug)]
pub struct FailingImageProducer;

#[async_trait]
impl ArtifactProducer for FailingImageProducer {
    async fn produce(&self, _tags: &[String], _keyword: &str) -> Result<Artifact, DomainError> {
        Err(DomainError::Upstream("image backend unavailable".into()))
    }
}
