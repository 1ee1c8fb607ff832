//! Application services for the Session & Turn context.

pub mod command_handlers;
pub mod query_handlers;
