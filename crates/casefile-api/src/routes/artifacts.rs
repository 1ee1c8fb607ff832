//! Serves stored artifacts (intro images) by key.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use casefile_core::error::DomainError;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /artifacts/{*key}
#[instrument(skip(state))]
async fn get_artifact(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let artifact = state
        .repos
        .artifacts
        .load_artifact(&key)
        .await?
        .ok_or_else(|| DomainError::NotFound {
            entity: "artifact",
            id: key,
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_owned()),
        ],
        artifact.bytes,
    )
        .into_response())
}

/// Returns the router for artifact downloads.
pub fn router() -> Router<AppState> {
    Router::new().route("/artifacts/{*key}", get(get_artifact))
}
