//! LLM integration for the concierge.
//!
//! A single backend is supported: any OpenAI-compatible chat-completions
//! endpoint, called directly over `reqwest`. Callers depend on the
//! `LlmProvider` trait so tests can substitute canned responses.

pub mod openai;
pub mod provider;

pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::*;
