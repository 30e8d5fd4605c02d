//! OpenAI-compatible chat completion client with a standard and a quick tier.

pub mod client;
pub mod types;

pub use client::{ChatClient, CompletionClient, LlmError, ResponseFormat, Tier};
