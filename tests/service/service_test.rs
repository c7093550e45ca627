//! End-to-end: SQLite database, local vector index, scripted model.

#[path = "../common/mod.rs"]
mod common;

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use common::{ScriptedModel, WordEmbedder};
use txt2sql::config::{ConnectionSpec, Settings};
use txt2sql::error::StatusClass;
use txt2sql::index::{LocalIndex, VectorIndex};
use txt2sql::introspect::SqlParam;
use txt2sql::service::{ApiResponse, Txt2SqlService};

struct Env {
    _dir: TempDir,
    spec: ConnectionSpec,
    service: Txt2SqlService,
    model: Arc<ScriptedModel>,
}

fn env(replies: &[&str]) -> Env {
    let dir = tempfile::tempdir().unwrap();
    let db = common::shop_db(dir.path());
    let index = LocalIndex::open(dir.path().join("index").join("vectors.db")).unwrap();
    let model = Arc::new(ScriptedModel::replying(replies));

    let settings = Settings::default();
    let service = Txt2SqlService::new(
        &settings,
        Arc::new(index),
        Arc::new(WordEmbedder::new()),
        model.clone(),
    );

    Env {
        spec: ConnectionSpec::sqlite(db.to_string_lossy()),
        _dir: dir,
        service,
        model,
    }
}

fn to_json(response: ApiResponse) -> serde_json::Value {
    serde_json::to_value(response).unwrap()
}

// ============================================================================
// Schema operations
// ============================================================================

#[tokio::test]
async fn test_list_and_extract() {
    let e = env(&[]);

    let tables = e.service.list_tables(&e.spec).await.unwrap();
    assert_eq!(tables, vec!["customers", "orders"]);

    let document = e.service.extract_schema(&e.spec, " customers ").await.unwrap();
    let json = to_json(ApiResponse::schema(document));
    assert_eq!(json["success"], true);
    assert_eq!(json["schema"]["customers"][0]["column_name"], "customer_id");
    assert_eq!(json["schema"]["customers"][0]["constraint_type"], "PRIMARY KEY");
    assert_eq!(json["schema"]["customers"][1]["is_nullable"], false);
}

#[tokio::test]
async fn test_index_single_table() {
    let e = env(&[]);

    let indexed = e.service.index_schema(&e.spec, "orders").await.unwrap();
    assert_eq!(indexed.report.namespace.as_str(), "sqlite_main_orders");
    assert_eq!(indexed.report.chunks, 1);
    assert_eq!(indexed.document.column_count(), 4);

    let json = to_json(ApiResponse::indexed(indexed));
    assert_eq!(
        json,
        json!({"success": true, "namespace_id": "sqlite_main_orders", "chunks": 1})
    );
}

#[tokio::test]
async fn test_index_unknown_table_is_bad_input() {
    let e = env(&[]);

    let err = e.service.index_schema(&e.spec, "refunds").await.unwrap_err();
    assert_eq!(err.category(), "invalid_input");
    assert_eq!(err.status(), StatusClass::BadInput);

    let stats = e.service.manager().index().describe_stats().await.unwrap();
    assert_eq!(stats.namespace_count(), 0);
}

#[tokio::test]
async fn test_multitable_context_namespace() {
    let e = env(&[]);

    let tables = vec!["orders".to_string(), " customers".to_string(), "orders".to_string()];
    let indexed = e.service.create_multitable_context(&e.spec, &tables).await.unwrap();
    assert_eq!(indexed.report.namespace.as_str(), "sqlite_main__629a4166d4d0efb2");
    assert_eq!(indexed.report.chunks, 2);

    let err = e
        .service
        .create_multitable_context(&e.spec, &[" ".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.category(), "invalid_input");
}

#[tokio::test]
async fn test_execute_query() {
    let e = env(&[]);

    let result = e
        .service
        .execute_query(
            &e.spec,
            "SELECT name FROM customers WHERE city = ?1",
            &[SqlParam::from("London")],
        )
        .await
        .unwrap();
    assert_eq!(
        to_json(ApiResponse::rows(result)),
        json!({"success": true, "columns": ["name"], "data": [{"name": "Ada"}]})
    );

    let err = e.service.execute_query(&e.spec, "  ", &[]).await.unwrap_err();
    assert_eq!(err.category(), "invalid_input");

    let err = e
        .service
        .execute_query(&e.spec, "SELECT nope FROM customers", &[])
        .await
        .unwrap_err();
    assert_eq!(err.category(), "query");
    assert_eq!(err.status(), StatusClass::BadInput);
}

// ============================================================================
// Generation
// ============================================================================

#[tokio::test]
async fn test_generate_and_run_sql() {
    let e = env(&[
        "I think this works: {\"sql\": \"SELECT count(*) AS n FROM orders\"",
        r#"{"sql": "SELECT count(*) AS n FROM orders", "explanation": "Counts orders.", "source_tables": ["orders"]}"#,
    ]);
    let indexed = e.service.index_schema(&e.spec, "orders").await.unwrap();

    let generated = e
        .service
        .generate_sql("How many orders are there?", &indexed.report.namespace, None)
        .await
        .unwrap();
    assert_eq!(generated.attempts, 2);
    assert!(e.model.prompts()[0].contains("Database type: sqlite"));

    let sql = generated.result.sql().unwrap().to_string();
    let json = to_json(ApiResponse::generated(generated));
    assert_eq!(json["sql"], "SELECT count(*) AS n FROM orders");
    assert_eq!(json["explanation"], "Counts orders.");
    assert_eq!(json["source_tables"], json!(["orders"]));

    let rows = e.service.execute_query(&e.spec, &sql, &[]).await.unwrap();
    assert_eq!(to_json(ApiResponse::rows(rows))["data"], json!([{"n": 3}]));
}

#[tokio::test]
async fn test_generation_failure_payload() {
    let e = env(&["{}", "{}", "{}"]);
    let namespace = e.service.table_namespace(&e.spec, "orders").unwrap();

    let result = e.service.generate_sql("count orders", &namespace, Some(3)).await;
    let json = to_json(ApiResponse::from_result(result, ApiResponse::generated));

    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["category"], "generation_exhausted");
    assert_eq!(json["error"]["status"], "internal");
    assert_eq!(e.model.calls(), 3);
}

#[tokio::test]
async fn test_recommendations_default_request() {
    let e = env(&[r#"{"recommendations": ["Spend per customer."]}"#]);
    let tables = vec!["customers".to_string(), "orders".to_string()];
    let indexed = e.service.create_multitable_context(&e.spec, &tables).await.unwrap();

    let generated = e
        .service
        .recommendations(&indexed.report.namespace, Some("   "))
        .await
        .unwrap();
    assert_eq!(
        to_json(ApiResponse::generated(generated)),
        json!({"success": true, "recommendations": ["Spend per customer."]})
    );

    let prompt = &e.model.prompts()[0];
    assert!(prompt.contains("Table 'customers'"));
    assert!(prompt.contains("Table 'orders'"));
    assert!(prompt.ends_with("Question: Recommend insights that can be derived from this data."));
}

#[tokio::test]
async fn test_index_survives_reopen() {
    let e = env(&[]);
    e.service.index_schema(&e.spec, "orders").await.unwrap();

    let path = Path::new(&e.spec.database)
        .parent()
        .unwrap()
        .join("index")
        .join("vectors.db");
    let reopened = LocalIndex::open(&path).unwrap();
    let stats = reopened.describe_stats().await.unwrap();
    assert_eq!(stats.namespace_count(), 1);
}
