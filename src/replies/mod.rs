//! Reply generation: prompt assembly and the AI call with its fallback.

pub mod generator;
pub mod prompts;

pub use generator::{ReplyGenerator, fallback_text};
