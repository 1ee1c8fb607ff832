//! Routes for account creation and login.
//!
//! Credentials are always checked before anything is replayed, and issued
//! tokens are never written to the idempotency store. A signup records only
//! the new account's id under its key, scoped to that account; a retry with
//! the same key and password logs the account in again.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use casefile_core::error::DomainError;
use casefile_core::idempotency::{IdempotencyCache, IdempotencyScope};
use casefile_identity::application::command_handlers::{self, IssuedToken};
use casefile_identity::domain::commands;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{ApiJson, IdempotencyKey};
use crate::routes::idempotency_cache;
use crate::state::AppState;

const SIGN_UP_ENDPOINT: &str = "/auth/signup";

/// Request body for POST /auth/signup and POST /auth/login.
#[derive(Deserialize)]
pub struct CredentialsRequest {
    /// Login email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

/// POST /auth/signup
#[instrument(skip_all)]
async fn sign_up(
    State(state): State<AppState>,
    IdempotencyKey(key): IdempotencyKey,
    ApiJson(request): ApiJson<CredentialsRequest>,
) -> Result<Json<IssuedToken>, ApiError> {
    let command = commands::SignUp {
        correlation_id: Uuid::new_v4(),
        email: request.email,
        password: request.password,
    };

    info!(correlation_id = %command.correlation_id, "handling sign_up command");

    let cache = idempotency_cache(&state);
    let result = command_handlers::handle_sign_up(
        &command,
        state.clock.as_ref(),
        state.repos.users.as_ref(),
        &state.passwords,
        &state.tokens,
    )
    .await;

    match result {
        Ok(issued) => {
            let scope = IdempotencyScope::new(issued.user_id.to_string(), SIGN_UP_ENDPOINT, key)?;
            cache
                .store(&scope, json!({ "user_id": issued.user_id }))
                .await?;
            Ok(Json(issued))
        }
        Err(DomainError::Conflict(reason)) => {
            let issued = repeat_sign_up(&state, &cache, command, key)
                .await?
                .ok_or(DomainError::Conflict(reason))?;
            Ok(Json(issued))
        }
        Err(err) => Err(err.into()),
    }
}

/// Treats a signup for a registered email as a retry when the password
/// matches and the same key was recorded for that account.
async fn repeat_sign_up(
    state: &AppState,
    cache: &IdempotencyCache<'_>,
    command: commands::SignUp,
    key: String,
) -> Result<Option<IssuedToken>, DomainError> {
    let log_in = commands::LogIn {
        correlation_id: command.correlation_id,
        email: command.email,
        password: command.password,
    };
    let issued = match command_handlers::handle_log_in(
        &log_in,
        state.clock.as_ref(),
        state.repos.users.as_ref(),
        &state.passwords,
        &state.tokens,
    )
    .await
    {
        Ok(issued) => issued,
        Err(DomainError::Unauthorized(_)) => return Ok(None),
        Err(err) => return Err(err),
    };

    let scope = IdempotencyScope::new(issued.user_id.to_string(), SIGN_UP_ENDPOINT, key)?;
    if cache.lookup(&scope).await?.is_none() {
        return Ok(None);
    }

    info!(
        correlation_id = %log_in.correlation_id,
        user_id = %issued.user_id,
        "signup retried with a recorded key"
    );
    Ok(Some(issued))
}

/// POST /auth/login
///
/// Login changes nothing, so the key is required but nothing is recorded or
/// replayed for it.
#[instrument(skip_all)]
async fn log_in(
    State(state): State<AppState>,
    IdempotencyKey(_key): IdempotencyKey,
    ApiJson(request): ApiJson<CredentialsRequest>,
) -> Result<Json<IssuedToken>, ApiError> {
    let command = commands::LogIn {
        correlation_id: Uuid::new_v4(),
        email: request.email,
        password: request.password,
    };

    info!(correlation_id = %command.correlation_id, "handling log_in command");

    let issued = command_handlers::handle_log_in(
        &command,
        state.clock.as_ref(),
        state.repos.users.as_ref(),
        &state.passwords,
        &state.tokens,
    )
    .await?;

    Ok(Json(issued))
}

/// Returns the router for the identity context's public endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(SIGN_UP_ENDPOINT, post(sign_up))
        .route("/auth/login", post(log_in))
}
