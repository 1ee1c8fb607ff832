//! Route modules organized by bounded context.

use casefile_core::idempotency::IdempotencyCache;
use serde::Serialize;

use crate::state::AppState;

pub mod artifacts;
pub mod auth;
pub mod health;
pub mod history;
pub mod me;
pub mod sessions;

/// Body returned by mutations with nothing else to report.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Ack {
    /// Always `true`.
    pub ok: bool,
}

impl Ack {
    pub(crate) const OK: Self = Self { ok: true };
}

pub(crate) fn idempotency_cache(state: &AppState) -> IdempotencyCache<'_> {
    IdempotencyCache::new(state.repos.idempotency.as_ref(), state.clock.as_ref())
}
