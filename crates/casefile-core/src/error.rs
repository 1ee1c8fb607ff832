//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A resource was not found, or is not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of resource that was looked up.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The operation is not legal for the session's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A uniqueness constraint would be violated (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on session {session_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The session that had the conflict.
        session_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// The caller is sending turns faster than the session allows.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Milliseconds until the next turn is accepted.
        retry_after_ms: i64,
    },

    /// A validation error in domain logic or request input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing, invalid, or expired credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The generation backend failed on a path with no fallback.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Shorthand for a [`DomainError::NotFound`] on a session.
    #[must_use]
    pub fn session_not_found(session_id: Uuid) -> Self {
        Self::NotFound {
            entity: "session",
            id: session_id.to_string(),
        }
    }
}
