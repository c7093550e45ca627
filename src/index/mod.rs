//! Namespace-scoped vector index.
//!
//! [`VectorIndex`] is the storage contract: per-namespace vector counts,
//! whole-namespace deletion, upsert and top-k similarity search. Two backends
//! implement it:
//!
//! - [`PineconeIndex`] - Pinecone data plane over REST
//! - [`LocalIndex`] - SQLite file with brute-force cosine search
//!
//! [`VectorIndexManager`] sits on top and owns the full-replace insert
//! protocol.

mod local;
mod manager;
mod pinecone;

pub use local::LocalIndex;
pub use manager::{InsertReport, VectorIndexManager};
pub use pinecone::PineconeIndex;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{IndexBackend, Settings};
use crate::schema::{IndexChunk, Namespace};

/// Errors from a vector index backend.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Index request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Index API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Index {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Local index error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid index response: {0}")]
    InvalidResponse(String),

    #[error("Index configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    pub(crate) fn from_reqwest(err: reqwest::Error, operation: &'static str, after: Duration) -> Self {
        if err.is_timeout() {
            IndexError::Timeout { operation, after }
        } else {
            IndexError::Http(err)
        }
    }
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Payload stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
}

/// One vector to upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl VectorRecord {
    /// Pair the `position`-th chunk of a namespace with its embedding.
    pub fn from_chunk(chunk: &IndexChunk, position: usize, values: Vec<f32>) -> Self {
        Self {
            id: format!("{}#{:04}", chunk.namespace, position),
            values,
            metadata: ChunkMetadata {
                text: chunk.text.clone(),
                source_table: chunk.source_table.clone(),
            },
        }
    }
}

/// A retrieved chunk and its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub source_table: Option<String>,
}

/// Index-wide statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Vector count per non-empty namespace.
    pub namespaces: HashMap<String, u64>,
}

impl IndexStats {
    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    pub fn contains(&self, namespace: &Namespace) -> bool {
        self.namespaces
            .get(namespace.as_str())
            .is_some_and(|count| *count > 0)
    }

    pub fn vector_count(&self, namespace: &Namespace) -> u64 {
        self.namespaces.get(namespace.as_str()).copied().unwrap_or(0)
    }
}

/// Vector storage partitioned by namespace.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Per-namespace vector counts for the whole index.
    async fn describe_stats(&self) -> IndexResult<IndexStats>;

    /// Remove every vector in `namespace`. Deleting an absent namespace is
    /// not an error.
    async fn delete_namespace(&self, namespace: &Namespace) -> IndexResult<()>;

    /// Insert or overwrite `records` in `namespace`, returning how many were
    /// written.
    async fn upsert(&self, namespace: &Namespace, records: Vec<VectorRecord>)
        -> IndexResult<usize>;

    /// The `top_k` records in `namespace` most similar to `vector`, best
    /// first.
    async fn query(
        &self,
        namespace: &Namespace,
        vector: &[f32],
        top_k: usize,
    ) -> IndexResult<Vec<ScoredChunk>>;
}

/// Build the configured index backend.
///
/// Settings must already have environment references expanded.
pub fn open_index(settings: &Settings) -> IndexResult<Arc<dyn VectorIndex>> {
    Ok(match settings.index.backend {
        IndexBackend::Pinecone => Arc::new(PineconeIndex::new(
            &settings.index.host,
            &settings.index.api_key,
            settings.timeouts.index(),
        )?),
        IndexBackend::Local => {
            let path = settings.local_index_path().ok_or_else(|| {
                IndexError::Config("could not determine the local index path".to_string())
            })?;
            Arc::new(LocalIndex::open(path)?)
        }
    })
}
