//! Shared types for the caller workspace.
//!
//! This crate holds the small vocabulary every other crate speaks: chat
//! messages exchanged with the language model, validated ZIP codes, and
//! the appointment slots offered to callers. It has no I/O and no
//! knowledge of Twilio, OpenAI or Google; those live in their own crates
//! and depend on this one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod slot;
mod zip;

pub use slot::AppointmentSlot;
pub use zip::ZipCode;

/// Errors produced when constructing shared types from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// The input is not a five-digit US ZIP code.
    #[error("invalid ZIP code: {0:?}")]
    InvalidZip(String),
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// The caller.
    User,
    /// The voice assistant.
    Assistant,
}

impl Role {
    /// Returns the wire label used by chat-completion APIs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a call's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
