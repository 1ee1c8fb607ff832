//! Idempotency cache over an [`IdempotencyRepository`].
//!
//! Every mutating operation runs through [`IdempotencyCache::run`]: look up
//! the composite key, execute on a miss, store the successful response, and
//! return whatever is persisted under the key. Failed operations are not
//! cached, so a retry after an error executes again.

use std::future::Future;

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::DomainError;
use crate::repository::{IdempotencyRecord, IdempotencyRepository};

/// Maximum accepted length of a client-supplied idempotency key.
pub const MAX_KEY_LEN: usize = 255;

/// Composite key scoping one idempotent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyScope {
    owner: String,
    endpoint: String,
    key: String,
}

impl IdempotencyScope {
    /// Builds a scope from its parts.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `key` is blank or longer than
    /// [`MAX_KEY_LEN`].
    pub fn new(
        owner: impl Into<String>,
        endpoint: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(DomainError::Validation(
                "idempotency key must not be blank".to_owned(),
            ));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(DomainError::Validation(format!(
                "idempotency key must be at most {MAX_KEY_LEN} bytes"
            )));
        }
        Ok(Self {
            owner: owner.into(),
            endpoint: endpoint.into(),
            key,
        })
    }

    /// Returns the owner scope.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the endpoint identifier.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the client-supplied key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Durable response cache giving at-most-once side effects per scope.
pub struct IdempotencyCache<'a> {
    repo: &'a dyn IdempotencyRepository,
    clock: &'a dyn Clock,
}

impl<'a> IdempotencyCache<'a> {
    /// Creates a cache over the given repository.
    #[must_use]
    pub fn new(repo: &'a dyn IdempotencyRepository, clock: &'a dyn Clock) -> Self {
        Self { repo, clock }
    }

    /// Returns the stored response for `scope`, if any.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the repository fails.
    pub async fn lookup(
        &self,
        scope: &IdempotencyScope,
    ) -> Result<Option<serde_json::Value>, DomainError> {
        let record = self
            .repo
            .find_response(&scope.owner, &scope.endpoint, &scope.key)
            .await?;
        Ok(record.map(|r| r.response))
    }

    /// Stores `response` under `scope` unless a response already exists, and
    /// returns the response that is persisted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the repository fails.
    pub async fn store(
        &self,
        scope: &IdempotencyScope,
        response: serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        let record = IdempotencyRecord {
            owner: scope.owner.clone(),
            endpoint: scope.endpoint.clone(),
            key: scope.key.clone(),
            response,
            created_at: self.clock.now(),
        };
        let persisted = self.repo.insert_response(&record).await?;
        if persisted != record {
            info!(
                endpoint = %scope.endpoint,
                "idempotent response already stored by a concurrent request"
            );
        }
        Ok(persisted.response)
    }

    /// Runs `operation` at most once per scope and returns its response.
    ///
    /// # Errors
    ///
    /// Propagates errors from `operation` (which are not cached) and from the
    /// repository. Returns `DomainError::Infrastructure` if the response
    /// cannot be serialized.
    pub async fn run<T, F, Fut>(
        &self,
        scope: &IdempotencyScope,
        operation: F,
    ) -> Result<serde_json::Value, DomainError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        if let Some(cached) = self.lookup(scope).await? {
            debug!(endpoint = %scope.endpoint, "replaying idempotent response");
            return Ok(cached);
        }

        let response = operation().await?;
        let value = serde_json::to_value(&response).map_err(|e| {
            DomainError::Infrastructure(format!("response serialization failed: {e}"))
        })?;
        self.store(scope, value).await
    }
}
