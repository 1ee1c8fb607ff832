//! Routes for the Session & Turn bounded context.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::{get, post}};
use casefile_core::error::DomainError;
use casefile_core::idempotency::IdempotencyScope;
use casefile_session::application::command_handlers;
use casefile_session::application::query_handlers::{self, SessionView};
use casefile_session::domain::commands::{self, TurnMode};
use casefile_session::domain::difficulty::Difficulty;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{ApiJson, AuthUser, IdempotencyKey};
use crate::routes::{Ack, idempotency_cache};
use crate::state::AppState;

/// Request body for POST /sessions.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Worldview text.
    #[serde(default)]
    pub worldview: String,
    /// Player attribute text.
    #[serde(default)]
    pub attribute: String,
    /// Difficulty name: `Easy`, `Normal`, `Hard` or `Expert`.
    pub difficulty: String,
    /// Image tags.
    #[serde(default)]
    pub image_tags: Vec<String>,
    /// Optional image keyword.
    pub image_keyword: Option<String>,
}

/// Request body for POST /sessions/{id}/turn.
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    /// How the input was phrased.
    #[serde(default)]
    pub mode: TurnMode,
    /// The player's input.
    pub input_text: Option<String>,
}

/// Request body for POST /sessions/{id}/submit.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Accused party.
    #[serde(default)]
    pub culprit: String,
    /// Free-form justification.
    #[serde(default)]
    pub logic_text: String,
}

/// Scopes a session action by the parsed id, so every spelling of the same
/// id in the URL shares one record.
fn session_scope(
    user_id: Uuid,
    session_id: Uuid,
    action: &str,
    key: String,
) -> Result<IdempotencyScope, DomainError> {
    IdempotencyScope::new(
        user_id.to_string(),
        format!("/sessions/{session_id}/{action}"),
        key,
    )
}

/// POST /sessions
#[instrument(skip_all, fields(user_id = %user_id))]
async fn create_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    IdempotencyKey(key): IdempotencyKey,
    ApiJson(request): ApiJson<CreateSessionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = IdempotencyScope::new(user_id.to_string(), "/sessions", key)?;
    let command = commands::CreateSession {
        correlation_id: Uuid::new_v4(),
        user_id,
        worldview: request.worldview,
        attribute: request.attribute,
        difficulty: request.difficulty.parse::<Difficulty>()?,
        image_tags: request.image_tags,
        image_keyword: request.image_keyword,
    };

    info!(correlation_id = %command.correlation_id, "handling create_session command");

    let images = state.intro_images();
    let response = idempotency_cache(&state)
        .run(&scope, || {
            command_handlers::handle_create_session(
                &command,
                state.clock.as_ref(),
                &state.rng,
                state.repos.sessions.as_ref(),
                &state.pipeline,
                &images,
            )
        })
        .await?;

    Ok(Json(response))
}

/// GET /sessions/{id}
#[instrument(skip_all, fields(user_id = %user_id, session_id = %session_id))]
async fn get_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let view =
        query_handlers::get_session_by_id(session_id, user_id, state.repos.sessions.as_ref())
            .await?;
    Ok(Json(view))
}

/// POST /sessions/{id}/turn
#[instrument(skip_all, fields(user_id = %user_id, session_id = %session_id))]
async fn take_turn(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    IdempotencyKey(key): IdempotencyKey,
    Path(session_id): Path<Uuid>,
    ApiJson(request): ApiJson<TurnRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = session_scope(user_id, session_id, "turn", key)?;
    let command = commands::TakeTurn {
        correlation_id: Uuid::new_v4(),
        user_id,
        session_id,
        mode: request.mode,
        input_text: request.input_text,
    };

    info!(correlation_id = %command.correlation_id, "handling take_turn command");

    let response = idempotency_cache(&state)
        .run(&scope, || {
            command_handlers::handle_take_turn(
                &command,
                state.clock.as_ref(),
                state.repos.sessions.as_ref(),
                &state.pipeline,
            )
        })
        .await?;

    Ok(Json(response))
}

/// POST /sessions/{id}/submit
#[instrument(skip_all, fields(user_id = %user_id, session_id = %session_id))]
async fn submit_solution(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    IdempotencyKey(key): IdempotencyKey,
    Path(session_id): Path<Uuid>,
    ApiJson(request): ApiJson<SubmitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = session_scope(user_id, session_id, "submit", key)?;
    let command = commands::SubmitSolution {
        correlation_id: Uuid::new_v4(),
        user_id,
        session_id,
        culprit: request.culprit,
        logic_text: request.logic_text,
    };

    info!(correlation_id = %command.correlation_id, "handling submit_solution command");

    let response = idempotency_cache(&state)
        .run(&scope, || async {
            command_handlers::handle_submit_solution(
                &command,
                state.clock.as_ref(),
                state.repos.sessions.as_ref(),
            )
            .await
            .map(|()| Ack::OK)
        })
        .await?;

    Ok(Json(response))
}

/// POST /sessions/{id}/score
#[instrument(skip_all, fields(user_id = %user_id, session_id = %session_id))]
async fn score_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    IdempotencyKey(key): IdempotencyKey,
    Path(session_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = session_scope(user_id, session_id, "score", key)?;
    let command = commands::ScoreSession {
        correlation_id: Uuid::new_v4(),
        user_id,
        session_id,
    };

    info!(correlation_id = %command.correlation_id, "handling score_session command");

    let response = idempotency_cache(&state)
        .run(&scope, || {
            command_handlers::handle_score_session(
                &command,
                state.clock.as_ref(),
                state.repos.sessions.as_ref(),
                &state.pipeline,
            )
        })
        .await?;

    Ok(Json(response))
}

/// Returns the router for the session context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/turn", post(take_turn))
        .route("/sessions/{id}/submit", post(submit_solution))
        .route("/sessions/{id}/score", post(score_session))
}
