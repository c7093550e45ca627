//! SQLite introspection over rusqlite.
//!
//! The database file must already exist. Queries run on the blocking pool and
//! are interrupted in-engine when the timeout expires.

use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, ErrorCode, InterruptHandle, OpenFlags};
use tokio::sync::oneshot;
use tracing::debug;

use super::{
    hex_bytes, CellValue, IntrospectError, IntrospectResult, SchemaIntrospector, SqlParam,
    TabularResult,
};
use crate::config::ConnectionSpec;
use crate::sql::dialect::Dialect;

/// SQLite introspector. Opens the file once per call.
pub struct SqliteIntrospector {
    path: String,
    schema: String,
    timeout: Duration,
}

impl SqliteIntrospector {
    pub fn new(spec: ConnectionSpec, schema: String, timeout: Duration) -> Self {
        Self {
            path: spec.database,
            schema,
            timeout,
        }
    }

    fn timeout_error(&self) -> IntrospectError {
        IntrospectError::Timeout {
            dialect: Dialect::Sqlite,
            operation: "query",
            after: self.timeout,
        }
    }
}

fn to_sqlite_value(param: &SqlParam) -> Value {
    match param {
        SqlParam::Null => Value::Null,
        SqlParam::Bool(b) => Value::Integer(i64::from(*b)),
        SqlParam::Int(i) => Value::Integer(*i),
        SqlParam::Float(f) => Value::Real(*f),
        SqlParam::Text(s) => Value::Text(s.clone()),
    }
}

fn extract_value(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Int(i),
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => CellValue::Text(hex_bytes(b)),
    }
}

fn query(conn: &Connection, sql: &str, params: &[SqlParam]) -> rusqlite::Result<TabularResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let bound: Vec<Value> = params.iter().map(to_sqlite_value).collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(bound.iter()))?;

    let mut out: Vec<Vec<CellValue>> = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(extract_value(row.get_ref(idx)?));
        }
        out.push(values);
    }

    Ok(TabularResult::new(columns, out))
}

fn run_blocking(
    path: &str,
    sql: &str,
    params: &[SqlParam],
    handle_tx: oneshot::Sender<InterruptHandle>,
) -> IntrospectResult<TabularResult> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)
        .map_err(|e| IntrospectError::connection(Dialect::Sqlite, path, e))?;

    // A closed receiver means the caller already gave up
    if handle_tx.send(conn.get_interrupt_handle()).is_err() {
        return Err(IntrospectError::Timeout {
            dialect: Dialect::Sqlite,
            operation: "query",
            after: Duration::ZERO,
        });
    }

    // The connection closes on drop at the end of this call
    query(&conn, sql, params).map_err(|e| match e.sqlite_error_code() {
        Some(ErrorCode::OperationInterrupted) => IntrospectError::Timeout {
            dialect: Dialect::Sqlite,
            operation: "query",
            after: Duration::ZERO,
        },
        _ => IntrospectError::query(Dialect::Sqlite, e),
    })
}

#[async_trait]
impl SchemaIntrospector for SqliteIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn run_query(&self, sql: &str, params: &[SqlParam]) -> IntrospectResult<TabularResult> {
        let path = self.path.clone();
        let sql = sql.to_string();
        let params = params.to_vec();
        let (handle_tx, mut handle_rx) = oneshot::channel();

        let mut task =
            tokio::task::spawn_blocking(move || run_blocking(&path, &sql, &params, handle_tx));

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result.map_err(|e| match e {
                IntrospectError::Timeout { .. } => self.timeout_error(),
                other => other,
            }),
            Ok(Err(join_err)) => Err(IntrospectError::Internal(format!(
                "sqlite worker failed: {}",
                join_err
            ))),
            Err(_) => {
                // Closing first means a late handle is either received here or never sent
                handle_rx.close();
                if let Ok(handle) = handle_rx.try_recv() {
                    handle.interrupt();
                }
                debug!(path = %self.path, "interrupted timed out sqlite query");
                Err(self.timeout_error())
            }
        }
    }
}
