//! Text embeddings.
//!
//! Chunks are embedded in [`EmbeddingMode::Document`] when indexed and
//! questions in [`EmbeddingMode::Query`] when retrieving; providers that
//! distinguish the two produce vectors tuned for each side.

mod cohere;

pub use cohere::CohereEmbedder;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which side of retrieval a text is embedded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    Document,
    Query,
}

/// Errors from an embedding provider.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Embedding request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Embedding API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Embedding client configuration error: {0}")]
    Config(String),
}

impl EmbedError {
    /// Classify a transport error, keeping timeouts distinct.
    pub(crate) fn from_reqwest(err: reqwest::Error, after: Duration) -> Self {
        if err.is_timeout() {
            EmbedError::Timeout(after)
        } else {
            EmbedError::Http(err)
        }
    }
}

pub type EmbedResult<T> = Result<T, EmbedError>;

/// Converts text to vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `texts` in order, one vector per text.
    async fn embed(&self, texts: &[String], mode: EmbeddingMode) -> EmbedResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str, mode: EmbeddingMode) -> EmbedResult<Vec<f32>> {
        self.embed(&[text.to_string()], mode)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidResponse("no embedding returned".to_string()))
    }

    fn model_name(&self) -> &str;
}
