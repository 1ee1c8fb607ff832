//! Casefile — HTTP API.
//!
//! Library half of the server binary so the full router can be built in
//! integration tests with in-memory collaborators.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Builds the complete application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::me::router())
        .merge(routes::sessions::router())
        .merge(routes::history::router())
        .merge(routes::artifacts::router())
        .with_state(state)
}
