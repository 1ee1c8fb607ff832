//! Route for the caller's play history.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use casefile_session::application::query_handlers::{self, HistoryEntry};
use serde::Serialize;
use tracing::instrument;

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;

/// Response body for GET /history.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Sessions, newest first.
    pub history: Vec<HistoryEntry>,
}

/// GET /history
#[instrument(skip_all, fields(user_id = %user_id))]
async fn list_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = query_handlers::list_history(user_id, state.repos.sessions.as_ref()).await?;
    Ok(Json(HistoryResponse { history }))
}

/// Returns the router for the history endpoint.
pub fn router() -> Router<AppState> {
    Router::new().route("/history", get(list_history))
}
