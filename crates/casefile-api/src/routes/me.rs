//! Routes for the caller's own profile.

use axum::extract::State;
use axum::{Json, Router, routing::{get, put}};
use casefile_core::idempotency::IdempotencyScope;
use casefile_identity::application::query_handlers::{self, ProfileView};
use casefile_identity::application::command_handlers;
use casefile_identity::domain::commands;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{ApiJson, AuthUser, IdempotencyKey};
use crate::routes::{Ack, idempotency_cache};
use crate::state::AppState;

/// Request body for PUT /me/nickname.
#[derive(Debug, Deserialize)]
pub struct NicknameRequest {
    /// Desired display name.
    pub nickname: String,
}

/// GET /me
#[instrument(skip_all, fields(user_id = %user_id))]
async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileView>, ApiError> {
    let view = query_handlers::get_profile(user_id, state.repos.users.as_ref()).await?;
    Ok(Json(view))
}

/// PUT /me/nickname
#[instrument(skip_all, fields(user_id = %user_id))]
async fn set_nickname(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    IdempotencyKey(key): IdempotencyKey,
    ApiJson(request): ApiJson<NicknameRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = IdempotencyScope::new(user_id.to_string(), "/me/nickname", key)?;
    let command = commands::SetNickname {
        correlation_id: Uuid::new_v4(),
        user_id,
        nickname: request.nickname,
    };

    info!(correlation_id = %command.correlation_id, "handling set_nickname command");

    let response = idempotency_cache(&state)
        .run(&scope, || async {
            command_handlers::handle_set_nickname(
                &command,
                state.clock.as_ref(),
                state.repos.users.as_ref(),
            )
            .await
            .map(|()| Ack::OK)
        })
        .await?;

    Ok(Json(response))
}

/// Returns the router for profile endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_profile))
        .route("/me/nickname", put(set_nickname))
}
