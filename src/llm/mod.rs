//! Language model access.
//!
//! - [`CompletionModel`] - chat completion in JSON response mode
//! - [`GroqModel`] - OpenAI-compatible chat completions (Groq by default)
//! - [`prompts`] - system and user prompts for SQL and recommendations
//! - [`clean_json`] - reduce a raw completion to its JSON object

mod clean;
mod groq;
pub mod prompts;

pub use clean::clean_json;
pub use groq::GroqModel;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// Errors from a completion provider.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Completion request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Completion API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid completion response: {0}")]
    InvalidResponse(String),

    #[error("Completion client configuration error: {0}")]
    Config(String),
}

impl ModelError {
    pub(crate) fn from_reqwest(err: reqwest::Error, after: Duration) -> Self {
        if err.is_timeout() {
            ModelError::Timeout(after)
        } else {
            ModelError::Http(err)
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
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
}

/// A chat model that answers with a single JSON object.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Raw text of the model's reply to `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> ModelResult<String>;

    fn model_name(&self) -> &str;
}
