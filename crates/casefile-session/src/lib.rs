//! Casefile — Session & Turn bounded context.
//!
//! Responsible for the session lifecycle (create, turn, submit, score),
//! turn budget and rate enforcement, abuse detection, and play history.

pub mod application;
pub mod domain;
