//! Domain model for the Identity context.

pub mod aggregates;
pub mod commands;
pub mod password;
pub mod token;
