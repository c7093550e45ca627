//! SQLite introspection against a real database file.

#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use txt2sql::config::ConnectionSpec;
use txt2sql::introspect::{introspector, CellValue, IntrospectError, SchemaIntrospector, SqlParam};
use txt2sql::sql::Dialect;

fn open(dir: &TempDir) -> Box<dyn SchemaIntrospector> {
    let path = common::shop_db(dir.path());
    let spec = ConnectionSpec::sqlite(path.to_string_lossy());
    introspector(&spec, Duration::from_secs(5)).unwrap()
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_list_tables_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    assert_eq!(db.dialect(), Dialect::Sqlite);
    assert_eq!(db.schema(), "main");
    assert_eq!(db.list_tables().await.unwrap(), vec!["customers", "orders"]);
}

#[tokio::test]
async fn test_columns_in_ordinal_order() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    let columns = db.extract_columns("orders").await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.column.as_str()).collect();
    assert_eq!(names, vec!["order_id", "customer_id", "amount", "placed_at"]);

    let positions: Vec<i64> = columns.iter().map(|c| c.ordinal_position).collect();
    assert_eq!(positions, vec![1, 2, 3, 4]);
    assert!(columns.iter().all(|c| c.table == "orders"));
}

#[tokio::test]
async fn test_column_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    let orders = db.extract_columns("orders").await.unwrap();
    assert_eq!(orders[0].constraint_type.as_deref(), Some("PRIMARY KEY"));
    assert!(!orders[0].nullable);
    assert_eq!(orders[1].constraint_type.as_deref(), Some("FOREIGN KEY"));
    assert!(!orders[1].nullable);
    assert_eq!(orders[2].data_type, "NUMERIC");
    assert!(orders[2].nullable);
    assert_eq!(orders[2].constraint_type, None);

    let customers = db.extract_columns("customers").await.unwrap();
    assert_eq!(customers[2].column, "city");
    assert_eq!(customers[2].default.as_deref(), Some("'unknown'"));
}

#[tokio::test]
async fn test_unknown_table_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    assert!(db.extract_columns("no_such_table").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_extract_schema_many_tables() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    let document = db
        .extract_schema(&["orders".to_string(), "customers".to_string()])
        .await
        .unwrap();
    assert_eq!(document.dialect, Dialect::Sqlite);
    assert_eq!(document.table_names().collect::<Vec<_>>(), vec!["customers", "orders"]);
    assert_eq!(document.column_count(), 7);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_run_query_with_params() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    let result = db
        .run_query(
            "SELECT name, city FROM customers WHERE customer_id = ?1",
            &[SqlParam::Int(2)],
        )
        .await
        .unwrap();

    assert_eq!(result.columns(), &["name".to_string(), "city".to_string()]);
    assert_eq!(result.rows(), &[vec![CellValue::Text("Grace".into()), CellValue::Null]]);
    assert_eq!(
        serde_json::to_value(result.to_records()).unwrap(),
        json!([{"name": "Grace", "city": null}])
    );
}

#[tokio::test]
async fn test_aggregate_values() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    let result = db
        .run_query(
            "SELECT customer_id, count(*) AS n, sum(amount) AS total \
             FROM orders GROUP BY customer_id ORDER BY customer_id",
            &[],
        )
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(
        serde_json::to_value(result.to_records()).unwrap(),
        json!([
            {"customer_id": 1, "n": 2, "total": 30.0},
            {"customer_id": 2, "n": 1, "total": 99.5}
        ])
    );
}

#[tokio::test]
async fn test_bad_sql_is_query_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    let err = db.run_query("SELECT * FROM missing", &[]).await.unwrap_err();
    assert!(matches!(err, IntrospectError::Query { .. }), "{err:?}");
}
