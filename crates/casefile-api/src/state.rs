//! Shared application state.

use std::sync::{Arc, Mutex};

use casefile_core::clock::Clock;
use casefile_core::generation::ArtifactProducer;
use casefile_core::repository::{
    ArtifactStore, IdempotencyRepository, SessionRepository, UserRepository,
};
use casefile_core::rng::DeterministicRng;
use casefile_identity::domain::password::Passwords;
use casefile_identity::domain::token::TokenSigner;
use casefile_narrative::application::pipeline::PromptPipeline;
use casefile_session::application::command_handlers::IntroImages;

/// The repositories the API reads and writes through.
#[derive(Clone)]
pub struct Repositories {
    /// Sessions and their child entities.
    pub sessions: Arc<dyn SessionRepository>,
    /// Player accounts.
    pub users: Arc<dyn UserRepository>,
    /// Idempotent responses.
    pub idempotency: Arc<dyn IdempotencyRepository>,
    /// Binary artifacts.
    pub artifacts: Arc<dyn ArtifactStore>,
}

impl Repositories {
    /// Backs every repository with one store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: SessionRepository + UserRepository + IdempotencyRepository + ArtifactStore + 'static,
    {
        Self {
            sessions: store.clone(),
            users: store.clone(),
            idempotency: store.clone(),
            artifacts: store,
        }
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Seed source for new sessions.
    pub rng: Arc<Mutex<dyn DeterministicRng>>,
    /// Persistence.
    pub repos: Repositories,
    /// Prompt pipeline over the text generation backend.
    pub pipeline: PromptPipeline,
    /// Intro image backend.
    pub images: Arc<dyn ArtifactProducer>,
    /// Password hasher.
    pub passwords: Arc<Passwords>,
    /// Session token signer.
    pub tokens: Arc<TokenSigner>,
    /// Base URL artifact links are built on.
    pub public_base_url: Arc<str>,
}

impl AppState {
    /// Where intro images for new sessions go.
    #[must_use]
    pub fn intro_images(&self) -> IntroImages<'_> {
        IntroImages {
            producer: self.images.as_ref(),
            store: self.repos.artifacts.as_ref(),
            public_base_url: &self.public_base_url,
        }
    }
}
