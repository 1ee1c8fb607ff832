//! Application services for the prompt pipeline.

pub mod pipeline;
