//! PostgreSQL introspection against a live server.
//!
//! Run with `TXT2SQL_DB_DIALECT=postgresql TXT2SQL_DB_HOST=... TXT2SQL_DB_NAME=...
//! TXT2SQL_DB_SCHEMA=public cargo test --test postgres_introspect_test -- --ignored`.

use std::time::Duration;

use serde_json::json;
use txt2sql::config::ConnectionSpec;
use txt2sql::introspect::{introspector, CellValue, SchemaIntrospector, SqlParam};

fn server() -> Box<dyn SchemaIntrospector> {
    let spec = ConnectionSpec::from_env().expect("TXT2SQL_DB_* must describe a PostgreSQL server");
    introspector(&spec, Duration::from_secs(10)).unwrap()
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn test_int_param_against_int4_column() {
    let db = server();

    let result = db
        .run_query(
            "SELECT * FROM (VALUES (1::int4, 'Ada'), (2::int4, 'Grace')) AS c(id, name) \
             WHERE id = $1",
            &[SqlParam::Int(1)],
        )
        .await
        .unwrap();

    assert_eq!(result.columns(), &["id", "name"]);
    assert_eq!(
        result.rows(),
        &[vec![CellValue::Int(1), CellValue::Text("Ada".into())]]
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn test_params_bind_to_narrow_and_numeric_types() {
    let db = server();

    let result = db
        .run_query(
            "SELECT $1::int2 + 1 AS small, $2::numeric * 2 AS amount, $3::uuid AS id",
            &[
                SqlParam::Int(4),
                SqlParam::Float(1.25),
                "6f1c2a9e-0c1d-4a55-9a57-3b2c1d0e9f10".into(),
            ],
        )
        .await
        .unwrap();

    assert_eq!(
        result.rows()[0],
        vec![
            CellValue::Int(5),
            CellValue::Float(2.5),
            CellValue::Text("6f1c2a9e-0c1d-4a55-9a57-3b2c1d0e9f10".into()),
        ]
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn test_non_null_values_keep_their_data() {
    let db = server();

    let result = db
        .run_query(
            "SELECT '6f1c2a9e-0c1d-4a55-9a57-3b2c1d0e9f10'::uuid AS id, \
                    interval '1 day' AS span, \
                    123456789012345678901234567890123::numeric AS wide, \
                    ARRAY[1, 2] AS pair, \
                    '10.0.0.1'::inet AS addr, \
                    'x'::name AS label, \
                    'NaN'::float8 AS nan",
            &[],
        )
        .await
        .unwrap();

    assert_eq!(
        result.rows()[0],
        vec![
            CellValue::Text("6f1c2a9e-0c1d-4a55-9a57-3b2c1d0e9f10".into()),
            CellValue::Text("1 day".into()),
            CellValue::Text("123456789012345678901234567890123".into()),
            CellValue::Json(json!([1, 2])),
            CellValue::Text("10.0.0.1".into()),
            CellValue::Text("x".into()),
            CellValue::Null,
        ]
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn test_empty_result_keeps_columns() {
    let db = server();

    let result = db
        .run_query("SELECT 1 AS one, 'a' AS two WHERE false", &[])
        .await
        .unwrap();

    assert_eq!(result.columns(), &["one", "two"]);
    assert!(result.is_empty());
}
