//! Application services for the Identity context.

pub mod command_handlers;
pub mod query_handlers;
