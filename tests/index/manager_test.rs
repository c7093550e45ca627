//! Full-replace indexing, soft cap handling and engine cache eviction.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use common::{column, embed_words, IndexOp, RecordingIndex, ScriptedModel, WordEmbedder};
use txt2sql::cache::{EngineCache, NamespaceLocks};
use txt2sql::config::EvictionPolicy;
use txt2sql::embed::{EmbedError, EmbedResult, Embedder, EmbeddingMode};
use txt2sql::engine::QueryGenerationEngine;
use txt2sql::error::Txt2SqlError;
use txt2sql::index::{VectorIndex, VectorIndexManager};
use txt2sql::schema::{Namespace, SchemaDocument};
use txt2sql::sql::Dialect;

struct Fixture {
    index: Arc<RecordingIndex>,
    engines: Arc<EngineCache>,
    locks: Arc<NamespaceLocks>,
    manager: Arc<VectorIndexManager>,
}

fn fixture_with(index: RecordingIndex, cap: usize, eviction: EvictionPolicy) -> Fixture {
    let index = Arc::new(index);
    let engines = Arc::new(EngineCache::new());
    let locks = Arc::new(NamespaceLocks::new());
    let manager = VectorIndexManager::new(
        index.clone(),
        Arc::new(WordEmbedder::new()),
        Arc::clone(&engines),
        Arc::clone(&locks),
    )
    .with_soft_cap(cap, eviction);
    Fixture {
        index,
        engines,
        locks,
        manager: Arc::new(manager),
    }
}

fn fixture() -> Fixture {
    fixture_with(RecordingIndex::new(), 100, EvictionPolicy::None)
}

fn single(table: &str) -> SchemaDocument {
    let mut document = SchemaDocument::new(Dialect::Sqlite);
    document.insert(
        table,
        vec![
            column(table, "id", "INTEGER", 1),
            column(table, "label", "TEXT", 2),
        ],
    );
    document
}

fn several(tables: &[&str]) -> SchemaDocument {
    let mut document = SchemaDocument::new(Dialect::Sqlite);
    for table in tables {
        document.insert(*table, vec![column(table, "id", "INTEGER", 1)]);
    }
    document
}

fn ns(name: &str) -> Namespace {
    Namespace::new(format!("sqlite_main_{name}"))
}

async fn stored_tables(index: &RecordingIndex, namespace: &Namespace) -> BTreeSet<String> {
    index
        .query(namespace, &embed_words("id"), 50)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|c| c.source_table)
        .collect()
}

// ============================================================================
// Replacement
// ============================================================================

#[tokio::test]
async fn test_reinsert_replaces_namespace() {
    let f = fixture();
    let namespace = ns("orders");

    let first = f
        .manager
        .insert(&several(&["customers", "orders", "products"]), &namespace)
        .await
        .unwrap();
    assert_eq!(first.chunks, 3);
    assert!(!first.replaced);

    let second = f.manager.insert(&single("orders"), &namespace).await.unwrap();
    assert_eq!(second.chunks, 1);
    assert!(second.replaced);

    let stats = f.index.describe_stats().await.unwrap();
    assert_eq!(stats.vector_count(&namespace), 1);
    assert_eq!(
        f.index.ops(),
        vec![
            IndexOp::Upsert(namespace.to_string(), 3),
            IndexOp::Delete(namespace.to_string()),
            IndexOp::Upsert(namespace.to_string(), 1),
        ]
    );
    assert_eq!(stored_tables(&f.index, &namespace).await, BTreeSet::from(["orders".to_string()]));
}

#[tokio::test]
async fn test_other_namespaces_untouched() {
    let f = fixture();
    f.manager.insert(&single("orders"), &ns("orders")).await.unwrap();
    f.manager.insert(&single("customers"), &ns("customers")).await.unwrap();
    f.manager.insert(&single("orders"), &ns("orders")).await.unwrap();

    let stats = f.index.describe_stats().await.unwrap();
    assert_eq!(stats.namespace_count(), 2);
    assert!(stats.contains(&ns("customers")));
}

#[tokio::test]
async fn test_empty_document_rejected() {
    let f = fixture();
    let mut document = SchemaDocument::new(Dialect::Sqlite);
    document.insert("ghost", vec![]);

    let err = f.manager.insert(&document, &ns("ghost")).await.unwrap_err();
    assert!(matches!(err, Txt2SqlError::InvalidInput(_)));
    assert!(f.index.ops().is_empty());
}

struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    async fn embed(&self, _texts: &[String], _mode: EmbeddingMode) -> EmbedResult<Vec<Vec<f32>>> {
        Err(EmbedError::Api {
            status: 500,
            body: "upstream failure".into(),
        })
    }

    fn model_name(&self) -> &str {
        "broken"
    }
}

#[tokio::test]
async fn test_failed_embedding_keeps_previous_snapshot() {
    let f = fixture();
    let namespace = ns("orders");
    f.manager.insert(&single("orders"), &namespace).await.unwrap();

    let broken = VectorIndexManager::new(
        f.index.clone(),
        Arc::new(BrokenEmbedder),
        Arc::clone(&f.engines),
        Arc::clone(&f.locks),
    );
    let err = broken.insert(&several(&["a", "b"]), &namespace).await.unwrap_err();
    assert_eq!(err.category(), "embedding");

    let stats = f.index.describe_stats().await.unwrap();
    assert_eq!(stats.vector_count(&namespace), 1);
    assert!(!f.index.ops().contains(&IndexOp::Delete(namespace.to_string())));
}

// ============================================================================
// Engine cache
// ============================================================================

#[tokio::test]
async fn test_reinsert_evicts_cached_engine() {
    let f = fixture();
    let namespace = ns("orders");
    let engine = QueryGenerationEngine::new(
        f.index.clone(),
        Arc::new(WordEmbedder::new()),
        Arc::new(ScriptedModel::new(vec![])),
        Arc::clone(&f.engines),
        Arc::clone(&f.locks),
    );

    f.manager.insert(&single("orders"), &namespace).await.unwrap();
    let before = engine.engine_for(&namespace);
    assert!(f.engines.contains(&namespace));

    f.manager.insert(&single("orders"), &namespace).await.unwrap();
    assert!(!f.engines.contains(&namespace));

    let after = engine.engine_for(&namespace);
    assert_ne!(before.build_id(), after.build_id());
}

// ============================================================================
// Soft cap
// ============================================================================

#[tokio::test]
async fn test_soft_cap_warns_without_evicting() {
    let f = fixture_with(RecordingIndex::new(), 2, EvictionPolicy::None);
    for name in ["a", "b"] {
        let report = f.manager.insert(&single(name), &ns(name)).await.unwrap();
        assert!(report.capacity_warning.is_none());
    }

    let report = f.manager.insert(&single("c"), &ns("c")).await.unwrap();
    assert_eq!(report.namespace_count, 2);
    assert!(report.capacity_warning.is_some());
    assert_eq!(report.evicted, None);
    assert_eq!(f.index.describe_stats().await.unwrap().namespace_count(), 3);
}

#[tokio::test]
async fn test_soft_cap_evicts_least_recently_indexed() {
    let f = fixture_with(RecordingIndex::new(), 2, EvictionPolicy::LeastRecentlyIndexed);
    f.manager.insert(&single("a"), &ns("a")).await.unwrap();
    f.manager.insert(&single("b"), &ns("b")).await.unwrap();
    // Refresh a so b becomes the oldest
    f.manager.insert(&single("a"), &ns("a")).await.unwrap();

    let report = f.manager.insert(&single("c"), &ns("c")).await.unwrap();
    assert_eq!(report.evicted, Some(ns("b")));

    let stats = f.index.describe_stats().await.unwrap();
    assert_eq!(stats.namespace_count(), 2);
    assert!(stats.contains(&ns("a")));
    assert!(stats.contains(&ns("c")));

    // The evicted namespace's lock goes with it
    assert!(!f.locks.contains(&ns("b")));
    assert!(f.locks.contains(&ns("a")));
}

#[tokio::test]
async fn test_replacing_at_cap_evicts_nothing() {
    let f = fixture_with(RecordingIndex::new(), 2, EvictionPolicy::LeastRecentlyIndexed);
    f.manager.insert(&single("a"), &ns("a")).await.unwrap();
    f.manager.insert(&single("b"), &ns("b")).await.unwrap();

    let report = f.manager.insert(&single("a"), &ns("a")).await.unwrap();
    assert!(report.replaced);
    assert!(report.capacity_warning.is_some());
    assert_eq!(report.evicted, None);
    assert_eq!(f.index.describe_stats().await.unwrap().namespace_count(), 2);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_concurrent_inserts_do_not_mix() {
    let f = fixture_with(
        RecordingIndex::with_upsert_delay(Duration::from_millis(30)),
        100,
        EvictionPolicy::None,
    );
    let namespace = ns("shared");
    let narrow = single("customers");
    let wide = several(&["orders", "products", "stores"]);

    let (a, b) = tokio::join!(
        f.manager.insert(&narrow, &namespace),
        f.manager.insert(&wide, &namespace)
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.replaced, b.replaced);

    let ops = f.index.ops();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[1], IndexOp::Delete(namespace.to_string()));

    let tables = stored_tables(&f.index, &namespace).await;
    let narrow_tables = BTreeSet::from(["customers".to_string()]);
    let wide_tables: BTreeSet<String> =
        ["orders", "products", "stores"].iter().map(|t| t.to_string()).collect();
    assert!(tables == narrow_tables || tables == wide_tables, "{tables:?}");
}
