//! Crate-level error taxonomy.
//!
//! Every failure surfaced to a caller carries a stable category, a status
//! class the route layer maps to a response code, and a message safe to show
//! to end users. Messages for internal categories never include driver or
//! provider text; that stays in the logs.

use serde::{Deserialize, Serialize};

use crate::config::{ConnectionConfigError, SettingsError};
use crate::embed::EmbedError;
use crate::index::IndexError;
use crate::introspect::IntrospectError;
use crate::llm::ModelError;

/// How a failure should be reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// The request itself is wrong: bad dialect, unreachable database,
    /// malformed SQL.
    BadInput,
    /// An external call exceeded its timeout.
    Timeout,
    /// Infrastructure or generation failure.
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum Txt2SqlError {
    #[error(transparent)]
    Introspect(#[from] IntrospectError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Invalid model output: {0}")]
    Validation(String),

    #[error("No valid answer after {attempts} attempt(s); last error: {last_error}")]
    GenerationExhausted { attempts: u32, last_error: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Config(#[from] SettingsError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConnectionConfigError> for Txt2SqlError {
    fn from(err: ConnectionConfigError) -> Self {
        Txt2SqlError::Introspect(err.into())
    }
}

pub type Txt2SqlResult<T> = Result<T, Txt2SqlError>;

impl Txt2SqlError {
    /// Stable machine-readable category.
    pub fn category(&self) -> &'static str {
        match self {
            Txt2SqlError::Introspect(e) => match e {
                IntrospectError::UnsupportedDialect(_) => "unsupported_dialect",
                IntrospectError::Connection { .. } => "connection",
                IntrospectError::Query { .. } => "query",
                IntrospectError::Timeout { .. } => "timeout",
                IntrospectError::InvalidInput(_) => "invalid_input",
                IntrospectError::Internal(_) => "internal",
            },
            Txt2SqlError::Index(IndexError::Timeout { .. })
            | Txt2SqlError::Embedding(EmbedError::Timeout(_))
            | Txt2SqlError::Model(ModelError::Timeout(_)) => "timeout",
            Txt2SqlError::Index(_) => "index",
            Txt2SqlError::Embedding(_) => "embedding",
            Txt2SqlError::Model(_) => "model",
            Txt2SqlError::Validation(_) => "validation",
            Txt2SqlError::GenerationExhausted { .. } => "generation_exhausted",
            Txt2SqlError::InvalidInput(_) => "invalid_input",
            Txt2SqlError::Config(_) => "config",
            Txt2SqlError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusClass {
        match self.category() {
            "timeout" => StatusClass::Timeout,
            "unsupported_dialect" | "connection" | "query" | "invalid_input" => {
                StatusClass::BadInput
            }
            _ => StatusClass::Internal,
        }
    }

    /// Whether re-prompting the model could fix this failure.
    pub fn is_retryable_validation(&self) -> bool {
        matches!(self, Txt2SqlError::Validation(_))
    }

    /// Message safe to return to end users.
    pub fn user_message(&self) -> String {
        match self {
            Txt2SqlError::Introspect(IntrospectError::Connection { dialect, target, .. }) => {
                format!("Could not connect to the {} database at {}.", dialect, target)
            }
            Txt2SqlError::Introspect(IntrospectError::Query { dialect, message, .. }) => {
                format!("The {} query failed: {}", dialect, message)
            }
            Txt2SqlError::Introspect(IntrospectError::Internal(_)) => {
                "An internal error occurred while talking to the database.".to_string()
            }
            Txt2SqlError::Introspect(e) => e.to_string(),
            Txt2SqlError::InvalidInput(msg) => format!("Invalid input: {}", msg),
            Txt2SqlError::GenerationExhausted { attempts, .. } => format!(
                "Could not generate a valid answer after {} attempt(s).",
                attempts
            ),
            _ if self.status() == StatusClass::Timeout => {
                "The request timed out. Please try again.".to_string()
            }
            Txt2SqlError::Index(_) => "The vector index is unavailable.".to_string(),
            Txt2SqlError::Embedding(_) => "The embedding service is unavailable.".to_string(),
            Txt2SqlError::Model(_) => "The language model is unavailable.".to_string(),
            Txt2SqlError::Config(_) => "The service is misconfigured.".to_string(),
            Txt2SqlError::Validation(_) | Txt2SqlError::Internal(_) => {
                "An internal error occurred.".to_string()
            }
        }
    }
}

/// Error payload returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub category: String,
    pub status: StatusClass,
    pub message: String,
}

impl From<&Txt2SqlError> for ErrorBody {
    fn from(err: &Txt2SqlError) -> Self {
        Self {
            category: err.category().to_string(),
            status: err.status(),
            message: err.user_message(),
        }
    }
}
