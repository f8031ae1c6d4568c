//! Language-model access for the caller service.
//!
//! Wraps an OpenAI-compatible chat-completion endpoint and the prompt
//! conventions the voice assistant relies on: a system prompt, an optional
//! scheduling context message, a bounded window of recent conversation,
//! and the `[END_CALL]` marker the model uses to end a call.

pub mod client;
pub mod config;
pub mod error;
pub mod prompt;
pub mod reply;

pub use client::LlmClient;
pub use config::{LlmConfig, DEFAULT_OPENAI_API_BASE};
pub use error::LlmError;
pub use prompt::{PromptBuilder, SchedulingContext};
pub use reply::{Reply, END_CALL_MARKER};
