//! Casefile — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use casefile_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection, migration, or client construction failed.
    #[error("startup error: {0}")]
    Startup(#[from] DomainError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Milliseconds until a rate-limited request may be retried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<i64>,
}

fn error_response(status: StatusCode, error: &'static str, message: String) -> Response {
    let body = ErrorBody {
        error,
        message,
        retry_after_ms: None,
    };
    (status, Json(body)).into_response()
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            DomainError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_status"),
            DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            DomainError::ConcurrencyConflict { .. } => {
                (StatusCode::CONFLICT, "concurrency_conflict")
            }
            DomainError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            DomainError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        };

        let message = match &self.0 {
            DomainError::Upstream(_) => {
                tracing::error!(error = %self.0, "generation backend failed");
                "the story generator is unavailable, please retry".to_owned()
            }
            DomainError::Infrastructure(_) => {
                tracing::error!(error = %self.0, "infrastructure failure");
                "internal server error".to_owned()
            }
            DomainError::Unauthorized(_) => {
                tracing::debug!(error = %self.0, "request rejected");
                self.0.to_string()
            }
            other => other.to_string(),
        };

        let retry_after_ms = match &self.0 {
            DomainError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        };

        let body = ErrorBody {
            error: error_code,
            message,
            retry_after_ms,
        };

        (status, Json(body)).into_response()
    }
}

/// Rejections raised while extracting a request, before any handler runs.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request body is not valid JSON for the endpoint.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// A mutating endpoint was called without an `Idempotency-Key` header.
    #[error("Idempotency-Key header is required")]
    IdempotencyKeyRequired,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let code = match &self {
            Self::InvalidBody(_) => "invalid_body",
            Self::IdempotencyKeyRequired => "idempotency_key_required",
        };
        error_response(StatusCode::BAD_REQUEST, code, self.to_string())
    }
}
