//! Schema documents, catalog mapping and chunking.

#[path = "../common/mod.rs"]
mod common;

use common::column;
use serde_json::json;

use txt2sql::introspect::{CellValue, TabularResult};
use txt2sql::schema::{ColumnRecord, Namespace, SchemaDocument, SchemaDocumentBuilder};
use txt2sql::sql::Dialect;

fn catalog(rows: Vec<Vec<CellValue>>) -> TabularResult {
    let columns = [
        "table_name",
        "column_name",
        "data_type",
        "is_nullable",
        "character_maximum_length",
        "numeric_precision",
        "numeric_scale",
        "constraint_type",
        "column_default",
        "ordinal_position",
    ];
    TabularResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

fn row(column: &str, position: i64, constraint: Option<&str>) -> Vec<CellValue> {
    vec![
        CellValue::Text("order_items".into()),
        CellValue::Text(column.into()),
        CellValue::Text("integer".into()),
        CellValue::Text("NO".into()),
        CellValue::Null,
        CellValue::Int(32),
        CellValue::Int(0),
        constraint.map_or(CellValue::Null, |c| CellValue::Text(c.into())),
        CellValue::Null,
        CellValue::Int(position),
    ]
}

// ============================================================================
// Catalog mapping
// ============================================================================

#[test]
fn test_catalog_rows_sorted_by_position() {
    let records = ColumnRecord::from_catalog(&catalog(vec![
        row("quantity", 3, None),
        row("order_id", 1, Some("PRIMARY KEY")),
        row("product_id", 2, Some("FOREIGN KEY")),
    ]));

    let names: Vec<&str> = records.iter().map(|r| r.column.as_str()).collect();
    assert_eq!(names, vec!["order_id", "product_id", "quantity"]);
    assert!(records.iter().all(|r| !r.nullable));
    assert_eq!(records[0].precision, Some(32));
}

#[test]
fn test_column_in_two_constraints_is_merged() {
    let records = ColumnRecord::from_catalog(&catalog(vec![
        row("order_id", 1, Some("PRIMARY KEY")),
        row("order_id", 1, Some("FOREIGN KEY")),
        row("order_id", 1, Some("PRIMARY KEY")),
        row("quantity", 2, None),
    ]));

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].constraint_type.as_deref(), Some("PRIMARY KEY, FOREIGN KEY"));
}

#[test]
fn test_missing_catalog_columns_yield_nothing() {
    let result = TabularResult::new(vec!["name".into()], vec![vec![CellValue::Text("x".into())]]);
    assert!(ColumnRecord::from_catalog(&result).is_empty());
}

#[test]
fn test_record_serializes_with_catalog_names() {
    let record = column("orders", "order_id", "integer", 1);
    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        json!({
            "table_name": "orders",
            "column_name": "order_id",
            "data_type": "integer",
            "is_nullable": false,
            "character_maximum_length": null,
            "numeric_precision": null,
            "numeric_scale": null,
            "constraint_type": "PRIMARY KEY",
            "column_default": null,
            "ordinal_position": 1
        })
    );
}

// ============================================================================
// Documents and chunks
// ============================================================================

#[test]
fn test_document_orders_columns() {
    let mut document = SchemaDocument::new(Dialect::Postgresql);
    document.insert(
        "orders",
        vec![
            column("orders", "amount", "numeric", 3),
            column("orders", "order_id", "integer", 1),
            column("orders", "customer_id", "integer", 2),
        ],
    );

    let names: Vec<&str> = document.tables["orders"].iter().map(|c| c.column.as_str()).collect();
    assert_eq!(names, vec!["order_id", "customer_id", "amount"]);
    assert_eq!(document.column_count(), 3);
}

#[test]
fn test_wide_table_chunks_overlap() {
    let mut document = SchemaDocument::new(Dialect::Postgresql);
    let columns = (1..=60)
        .map(|i| column("metrics", &format!("m{i}"), "double precision", i))
        .collect();
    document.insert("metrics", columns);
    let ns = Namespace::new("postgresql_public_metrics");

    let chunks = SchemaDocumentBuilder::new(100, 20).build(&document, &ns);
    assert!(chunks.len() > 2);
    for pair in chunks.windows(2) {
        let tail: Vec<&str> = pair[0].text.split_whitespace().rev().take(20).collect();
        let head: Vec<&str> = pair[1].text.split_whitespace().take(20).collect();
        assert_eq!(tail.into_iter().rev().collect::<Vec<_>>(), head);
    }
    assert!(chunks.iter().all(|c| c.namespace == ns));
}

#[test]
fn test_small_table_is_one_chunk() {
    let mut document = SchemaDocument::new(Dialect::Sqlite);
    document.insert("tags", vec![column("tags", "tag_id", "INTEGER", 1)]);
    let ns = Namespace::new("sqlite_main_tags");

    let chunks = SchemaDocumentBuilder::default().build(&document, &ns);
    assert_eq!(chunks.len(), 1);
    let parsed: serde_json::Value = serde_json::from_str(&chunks[0].text).unwrap();
    assert_eq!(parsed["tags"][0]["column_name"], "tag_id");
}

#[test]
fn test_multi_table_chunks_name_their_table() {
    let mut document = SchemaDocument::new(Dialect::Mysql);
    document.insert("orders", vec![column("orders", "order_id", "int", 1)]);
    document.insert("customers", vec![column("customers", "customer_id", "int", 1)]);
    let ns = Namespace::new("mysql_shop__629a4166d4d0efb2");

    let chunks = SchemaDocumentBuilder::default().build(&document, &ns);
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert!(texts[0].starts_with("Table 'customers': [{\"table_name\": \"customers\""));
    assert!(texts[1].starts_with("Table 'orders': [{\"table_name\": \"orders\""));
}
