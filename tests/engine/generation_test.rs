//! Retrieval-augmented generation over a real local index.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{column, ScriptedModel, WordEmbedder};
use txt2sql::cache::{EngineCache, NamespaceLocks};
use txt2sql::engine::{GenerationResult, OutputKind, QueryGenerationEngine};
use txt2sql::error::{StatusClass, Txt2SqlError};
use txt2sql::index::{LocalIndex, VectorIndex, VectorIndexManager};
use txt2sql::llm::ModelError;
use txt2sql::schema::{Namespace, SchemaDocument};
use txt2sql::sql::Dialect;

struct Pipeline {
    manager: VectorIndexManager,
    engine: QueryGenerationEngine,
    model: Arc<ScriptedModel>,
    locks: Arc<NamespaceLocks>,
}

fn pipeline(model: ScriptedModel) -> Pipeline {
    let index: Arc<dyn VectorIndex> = Arc::new(LocalIndex::open_in_memory().unwrap());
    let embedder = Arc::new(WordEmbedder::new());
    let engines = Arc::new(EngineCache::new());
    let locks = Arc::new(NamespaceLocks::new());
    let model = Arc::new(model);

    let manager = VectorIndexManager::new(
        Arc::clone(&index),
        embedder.clone(),
        Arc::clone(&engines),
        Arc::clone(&locks),
    );
    let engine =
        QueryGenerationEngine::new(index, embedder, model.clone(), engines, Arc::clone(&locks));
    Pipeline {
        manager,
        engine,
        model,
        locks,
    }
}

fn orders() -> SchemaDocument {
    let mut document = SchemaDocument::new(Dialect::Postgresql);
    document.insert(
        "orders",
        vec![
            column("orders", "order_id", "integer", 1),
            column("orders", "amount", "numeric", 2),
        ],
    );
    document
}

fn ns() -> Namespace {
    Namespace::new("postgresql_public_orders")
}

// ============================================================================
// Self-correction
// ============================================================================

#[tokio::test]
async fn test_missing_key_then_valid_sql() {
    let p = pipeline(ScriptedModel::replying(&[
        r#"{"query": "SELECT sum(amount) FROM orders"}"#,
        r#"Sure! ```json
{"sql": "SELECT sum(amount) FROM orders", "explanation": "Total revenue.", "source_tables": ["orders"]}
```"#,
    ]));
    p.manager.insert(&orders(), &ns()).await.unwrap();

    let generated = p
        .engine
        .generate("What is the total revenue?", &ns(), OutputKind::Sql, 2)
        .await
        .unwrap();

    assert_eq!(generated.attempts, 2);
    assert_eq!(
        generated.result,
        GenerationResult::Sql {
            sql: "SELECT sum(amount) FROM orders".into(),
            explanation: "Total revenue.".into(),
            source_tables: vec!["orders".into()],
        }
    );
    assert!(generated.raw_json.starts_with("{\"sql\""));

    let prompts = p.model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("\"column_name\": \"amount\""));
    assert!(prompts[0].contains("Database type: postgresql"));
    assert!(prompts[0].ends_with("Question: What is the total revenue?"));
    assert!(prompts[1].contains("rejected: the response has no 'sql' key"));
}

#[tokio::test]
async fn test_unparseable_sql_is_corrected() {
    let p = pipeline(ScriptedModel::replying(&[
        r#"{"sql": "SELEC amount FRM orders"}"#,
        r#"{"sql": "SELECT amount FROM orders"}"#,
    ]));
    p.manager.insert(&orders(), &ns()).await.unwrap();

    let generated = p
        .engine
        .generate("list amounts", &ns(), OutputKind::Sql, 3)
        .await
        .unwrap();

    assert_eq!(generated.attempts, 2);
    assert_eq!(generated.result.sql(), Some("SELECT amount FROM orders"));
    assert!(p.model.prompts()[1].contains("not valid postgresql syntax"));
}

#[tokio::test]
async fn test_exhausted_reports_last_error() {
    let p = pipeline(ScriptedModel::replying(&["not json", "[1, 2]", r#"{"sql": "SELECT 1"}"#]));
    p.manager.insert(&orders(), &ns()).await.unwrap();

    let err = p
        .engine
        .generate("anything", &ns(), OutputKind::Sql, 2)
        .await
        .unwrap_err();

    match &err {
        Txt2SqlError::GenerationExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(*attempts, 2);
            assert_eq!(last_error, "the response must be a single JSON object");
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(err.category(), "generation_exhausted");
    assert_eq!(p.model.calls(), 2);
}

#[tokio::test]
async fn test_model_timeout_aborts_immediately() {
    let p = pipeline(ScriptedModel::new(vec![
        Err(ModelError::Timeout(Duration::from_secs(30))),
        Ok(r#"{"sql": "SELECT 1"}"#.to_string()),
    ]));
    p.manager.insert(&orders(), &ns()).await.unwrap();

    let err = p
        .engine
        .generate("anything", &ns(), OutputKind::Sql, 3)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "timeout");
    assert_eq!(err.status(), StatusClass::Timeout);
    assert_eq!(p.model.calls(), 1);
}

// ============================================================================
// Retrieval and cache freshness
// ============================================================================

#[tokio::test]
async fn test_unindexed_namespace_has_no_context() {
    let p = pipeline(ScriptedModel::replying(&[r#"{"sql": "SELECT 1"}"#]));

    p.engine
        .generate("anything", &ns(), OutputKind::Sql, 1)
        .await
        .unwrap();
    assert!(p.model.prompts()[0].contains("(no schema context was found)"));
}

#[tokio::test]
async fn test_unindexed_namespaces_leave_no_locks() {
    let p = pipeline(ScriptedModel::replying(&[
        r#"{"sql": "SELECT 1"}"#,
        r#"{"sql": "SELECT 2"}"#,
        r#"{"sql": "SELECT amount FROM orders"}"#,
    ]));

    for name in ["postgresql_public_a", "postgresql_public_b"] {
        p.engine
            .generate("anything", &Namespace::new(name), OutputKind::Sql, 1)
            .await
            .unwrap();
    }
    assert!(p.locks.is_empty());

    p.manager.insert(&orders(), &ns()).await.unwrap();
    p.engine
        .generate("amounts", &ns(), OutputKind::Sql, 1)
        .await
        .unwrap();
    assert!(p.locks.contains(&ns()));
}

#[tokio::test]
async fn test_reindex_is_visible_to_next_generation() {
    let p = pipeline(ScriptedModel::replying(&[
        r#"{"sql": "SELECT amount FROM orders"}"#,
        r#"{"sql": "SELECT discount FROM orders"}"#,
    ]));
    p.manager.insert(&orders(), &ns()).await.unwrap();
    p.engine
        .generate("amounts", &ns(), OutputKind::Sql, 1)
        .await
        .unwrap();

    let mut updated = SchemaDocument::new(Dialect::Postgresql);
    updated.insert(
        "orders",
        vec![
            column("orders", "order_id", "integer", 1),
            column("orders", "discount", "numeric", 2),
        ],
    );
    p.manager.insert(&updated, &ns()).await.unwrap();
    p.engine
        .generate("discounts", &ns(), OutputKind::Sql, 1)
        .await
        .unwrap();

    let prompts = p.model.prompts();
    assert!(prompts[0].contains("\"amount\""));
    assert!(prompts[1].contains("\"discount\""));
    assert!(!prompts[1].contains("\"amount\""));
}

#[tokio::test]
async fn test_recommendations() {
    let p = pipeline(ScriptedModel::replying(&[
        r#"{"recommendations": ["Revenue by month.", "Largest orders."]}"#,
    ]));
    p.manager.insert(&orders(), &ns()).await.unwrap();

    let generated = p
        .engine
        .generate("ideas", &ns(), OutputKind::Recommendations, 2)
        .await
        .unwrap();
    assert_eq!(
        generated.result,
        GenerationResult::Recommendations {
            recommendations: vec!["Revenue by month.".into(), "Largest orders.".into()],
        }
    );
}
