//! Full-replace indexing of schema documents.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info, warn};

use super::{IndexStats, VectorIndex, VectorRecord};
use crate::cache::{EngineCache, NamespaceLocks};
use crate::config::{EvictionPolicy, IndexSettings};
use crate::embed::{Embedder, EmbeddingMode};
use crate::error::{Txt2SqlError, Txt2SqlResult};
use crate::schema::{Namespace, SchemaDocument, SchemaDocumentBuilder};

/// Outcome of one [`VectorIndexManager::insert`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    pub namespace: Namespace,
    /// Chunks embedded and written.
    pub chunks: usize,
    /// Whether earlier vectors in the namespace were deleted first.
    pub replaced: bool,
    /// Namespaces in the index before this insert.
    pub namespace_count: usize,
    /// Set when the index was at or above the namespace soft cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_warning: Option<String>,
    /// Namespace removed to make room, if the eviction policy chose one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evicted: Option<Namespace>,
}

/// When each namespace was last indexed by this process.
#[derive(Debug, Default)]
struct Ledger {
    sequence: u64,
    indexed: HashMap<Namespace, u64>,
}

impl Ledger {
    fn record(&mut self, namespace: &Namespace) {
        self.sequence += 1;
        self.indexed.insert(namespace.clone(), self.sequence);
    }

    fn forget(&mut self, namespace: &Namespace) {
        self.indexed.remove(namespace);
    }

    /// Namespaces oldest first, excluding `keep`.
    fn oldest_first(&self, keep: &Namespace) -> Vec<Namespace> {
        let mut entries: Vec<_> = self
            .indexed
            .iter()
            .filter(|(ns, _)| *ns != keep)
            .collect();
        entries.sort_by_key(|(_, seq)| **seq);
        entries.into_iter().map(|(ns, _)| ns.clone()).collect()
    }
}

/// Owns insertion into the namespace-scoped index.
pub struct VectorIndexManager {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    builder: SchemaDocumentBuilder,
    engines: Arc<EngineCache>,
    locks: Arc<NamespaceLocks>,
    soft_cap: usize,
    eviction: EvictionPolicy,
    ledger: Mutex<Ledger>,
}

impl VectorIndexManager {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        engines: Arc<EngineCache>,
        locks: Arc<NamespaceLocks>,
    ) -> Self {
        let defaults = IndexSettings::default();
        Self {
            index,
            embedder,
            builder: SchemaDocumentBuilder::default(),
            engines,
            locks,
            soft_cap: defaults.namespace_soft_cap,
            eviction: defaults.eviction,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn with_builder(mut self, builder: SchemaDocumentBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_soft_cap(mut self, soft_cap: usize, eviction: EvictionPolicy) -> Self {
        self.soft_cap = soft_cap;
        self.eviction = eviction;
        self
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Replace the contents of `namespace` with `document`.
    ///
    /// Chunks are embedded before anything is deleted, so a failed embedding
    /// leaves the previous snapshot in place. The namespace write lock is
    /// held from the stats check until the cached engine is evicted.
    pub async fn insert(
        &self,
        document: &SchemaDocument,
        namespace: &Namespace,
    ) -> Txt2SqlResult<InsertReport> {
        self.try_insert(document, namespace).await.inspect_err(|e| {
            error!(%namespace, category = e.category(), error = %e, "schema insert failed");
        })
    }

    async fn try_insert(
        &self,
        document: &SchemaDocument,
        namespace: &Namespace,
    ) -> Txt2SqlResult<InsertReport> {
        if document.column_count() == 0 {
            return Err(Txt2SqlError::InvalidInput(format!(
                "no columns found for {}; nothing to index",
                namespace
            )));
        }

        let chunks = self.builder.build(document, namespace);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts, EmbeddingMode::Document).await?;
        if vectors.len() != chunks.len() {
            return Err(Txt2SqlError::Internal(format!(
                "embedded {} of {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, values))| VectorRecord::from_chunk(chunk, i, values))
            .collect();

        let _guard = self.locks.write(namespace).await;

        let stats = self.index.describe_stats().await?;
        let namespace_count = stats.namespace_count();
        let replaced = stats.contains(namespace);

        let mut capacity_warning = None;
        let mut evicted = None;
        if namespace_count >= self.soft_cap {
            let message = format!(
                "index holds {} namespaces (soft cap {})",
                namespace_count, self.soft_cap
            );
            warn!(%namespace, namespace_count, soft_cap = self.soft_cap, "namespace soft cap reached");
            capacity_warning = Some(message);

            if self.eviction == EvictionPolicy::LeastRecentlyIndexed && !replaced {
                evicted = self.evict_oldest(namespace, &stats).await?;
            }
        }

        if replaced {
            info!(%namespace, vectors = stats.vector_count(namespace), "clearing namespace");
            self.index.delete_namespace(namespace).await?;
        }

        let written = self.index.upsert(namespace, records).await?;

        if self.engines.evict(namespace) {
            info!(%namespace, "evicted outdated query engine");
        }
        self.ledger()?.record(namespace);

        info!(%namespace, chunks = written, replaced, "schema indexed");
        Ok(InsertReport {
            namespace: namespace.clone(),
            chunks: written,
            replaced,
            namespace_count,
            capacity_warning,
            evicted,
        })
    }

    fn ledger(&self) -> Txt2SqlResult<std::sync::MutexGuard<'_, Ledger>> {
        self.ledger
            .lock()
            .map_err(|_| Txt2SqlError::Internal("index ledger lock poisoned".to_string()))
    }

    /// Delete the least recently indexed namespace other than `keep`.
    ///
    /// Namespaces with an insert or generation in flight are skipped rather
    /// than waited on, so two inserts can never wait on each other.
    async fn evict_oldest(
        &self,
        keep: &Namespace,
        stats: &IndexStats,
    ) -> Txt2SqlResult<Option<Namespace>> {
        let candidates = self.ledger()?.oldest_first(keep);

        for candidate in candidates {
            if !stats.contains(&candidate) {
                self.ledger()?.forget(&candidate);
                continue;
            }
            let Some(victim_guard) = self.locks.try_write(&candidate) else {
                continue;
            };

            self.index.delete_namespace(&candidate).await?;
            self.engines.evict(&candidate);
            self.ledger()?.forget(&candidate);
            drop(victim_guard);
            self.locks.prune(&candidate);
            warn!(evicted = %candidate, "evicted least recently indexed namespace");
            return Ok(Some(candidate));
        }

        warn!(namespace = %keep, "no namespace eligible for eviction");
        Ok(None)
    }
}
