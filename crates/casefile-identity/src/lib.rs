//! Casefile — Identity bounded context.
//!
//! Responsible for player accounts (signup, login, profile, nickname),
//! password hashing, and issuing and verifying signed access tokens.

pub mod application;
pub mod domain;
