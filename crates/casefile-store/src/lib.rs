//! `PostgreSQL` persistence for the Casefile mystery game engine.
//!
//! [`PgStore`] implements every repository trait from `casefile-core` over a
//! single connection pool. Session writes are conditional on the stored
//! version and commit together with the child rows they add.

mod artifacts;
mod idempotency;
mod sessions;
mod users;

pub mod pg_store;

pub use pg_store::{MIGRATOR, PgStore, connect};
