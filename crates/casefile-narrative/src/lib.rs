//! Casefile — prompt pipeline bounded context.
//!
//! Responsible for rendering prompt templates from session state, calling
//! the external generation backend for each role, parsing its output into
//! typed results, and applying the per-role fallback policy.

pub mod application;
pub mod clients;
pub mod domain;
