//! HTTP clients for the external generation backends.

pub mod imagen;
pub mod openai;
