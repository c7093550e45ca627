//! Cohere embed API (v2).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbedError, EmbedResult, Embedder, EmbeddingMode};
use crate::config::EmbeddingSettings;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: &'static str,
    embedding_types: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: EmbeddingsByType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsByType {
    #[serde(default)]
    float: Vec<Vec<f32>>,
}

fn input_type(mode: EmbeddingMode) -> &'static str {
    match mode {
        EmbeddingMode::Document => "search_document",
        EmbeddingMode::Query => "search_query",
    }
}

/// Cohere embedding provider.
pub struct CohereEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    batch_size: usize,
    timeout: Duration,
}

impl CohereEmbedder {
    /// Create a provider from resolved settings.
    ///
    /// `settings.api_key` must already have environment references expanded.
    pub fn new(settings: &EmbeddingSettings, timeout: Duration) -> EmbedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v2/embed", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            batch_size: settings.batch_size.max(1),
            timeout,
        })
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        mode: EmbeddingMode,
    ) -> EmbedResult<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            texts,
            input_type: input_type(mode),
            embedding_types: ["float"],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api { status, body });
        }

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::from_reqwest(e, self.timeout))?;

        if result.embeddings.float.len() != texts.len() {
            return Err(EmbedError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.embeddings.float.len()
            )));
        }
        Ok(result.embeddings.float)
    }
}

#[async_trait]
impl Embedder for CohereEmbedder {
    async fn embed(&self, texts: &[String], mode: EmbeddingMode) -> EmbedResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, count = batch.len(), ?mode, "embedding batch");
            vectors.extend(self.embed_batch(batch, mode).await?);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
