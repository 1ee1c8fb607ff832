//! Domain model for the Session & Turn context.

pub mod abuse;
pub mod aggregates;
pub mod commands;
pub mod difficulty;
pub mod rate;
