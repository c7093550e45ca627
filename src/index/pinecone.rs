//! Pinecone data plane client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{
    ChunkMetadata, IndexError, IndexResult, IndexStats, ScoredChunk, VectorIndex, VectorRecord,
};
use crate::schema::Namespace;

const API_VERSION: &str = "2024-07";

/// Vectors per upsert request.
const UPSERT_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: u64,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
struct Match {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<ChunkMetadata>,
}

/// Pinecone serverless index, addressed by its data plane host.
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    timeout: Duration,
}

impl PineconeIndex {
    pub fn new(host: &str, api_key: &str, timeout: Duration) -> IndexResult<Self> {
        if host.is_empty() {
            return Err(IndexError::Config("index.host is empty".to_string()));
        }
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Config(e.to_string()))?;

        Ok(Self {
            client,
            host,
            api_key: api_key.to_string(),
            timeout,
        })
    }

    async fn post(
        &self,
        operation: &'static str,
        path: &str,
        body: &serde_json::Value,
    ) -> IndexResult<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| IndexError::from_reqwest(e, operation, self.timeout))
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        response: reqwest::Response,
    ) -> IndexResult<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Api { status, body });
        }
        response
            .json()
            .await
            .map_err(|e| IndexError::from_reqwest(e, operation, self.timeout))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn describe_stats(&self) -> IndexResult<IndexStats> {
        let response = self
            .post("describe_stats", "/describe_index_stats", &json!({}))
            .await?;
        let stats: StatsResponse = self.read_json("describe_stats", response).await?;

        Ok(IndexStats {
            namespaces: stats
                .namespaces
                .into_iter()
                .map(|(name, summary)| (name, summary.vector_count))
                .collect(),
        })
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> IndexResult<()> {
        let body = json!({ "deleteAll": true, "namespace": namespace.as_str() });
        let response = self.post("delete", "/vectors/delete", &body).await?;

        // Serverless indexes answer 404 for a namespace that holds nothing
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%namespace, "namespace already empty");
            return Ok(());
        }
        let _: serde_json::Value = self.read_json("delete", response).await?;
        Ok(())
    }

    async fn upsert(
        &self,
        namespace: &Namespace,
        records: Vec<VectorRecord>,
    ) -> IndexResult<usize> {
        let mut written = 0;
        for batch in records.chunks(UPSERT_BATCH) {
            let body = serde_json::to_value(UpsertRequest {
                vectors: batch,
                namespace: namespace.as_str(),
            })
            .map_err(|e| IndexError::InvalidResponse(e.to_string()))?;

            let response = self.post("upsert", "/vectors/upsert", &body).await?;
            let result: UpsertResponse = self.read_json("upsert", response).await?;
            written += result.upserted_count;
        }
        Ok(written)
    }

    async fn query(
        &self,
        namespace: &Namespace,
        vector: &[f32],
        top_k: usize,
    ) -> IndexResult<Vec<ScoredChunk>> {
        let body = json!({
            "namespace": namespace.as_str(),
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });
        let response = self.post("query", "/query", &body).await?;
        let result: QueryResponse = self.read_json("query", response).await?;

        Ok(result
            .matches
            .into_iter()
            .filter_map(|m| {
                let metadata = m.metadata?;
                Some(ScoredChunk {
                    id: m.id,
                    score: m.score,
                    text: metadata.text,
                    source_table: metadata.source_table,
                })
            })
            .collect())
    }
}
