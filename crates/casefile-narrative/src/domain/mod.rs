//! Domain model for the prompt pipeline.

pub mod outputs;
pub mod prompts;
pub mod state;
