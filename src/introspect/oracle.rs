//! Oracle introspection over the blocking `oracle` driver.
//!
//! Calls run on the blocking pool. The driver's call timeout is set to the
//! configured timeout so an expired call is aborted by the client library
//! rather than left running on the pool.

use std::time::Duration;

use async_trait::async_trait;
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, SqlValue};
use tracing::debug;

use super::{
    CellValue, IntrospectError, IntrospectResult, SchemaIntrospector, SqlParam, TabularResult,
};
use crate::config::ConnectionSpec;
use crate::sql::dialect::Dialect;

/// Grace period on top of the driver call timeout before giving up on the pool task.
const POOL_GRACE: Duration = Duration::from_secs(2);

/// Oracle introspector. Opens one connection per call.
pub struct OracleIntrospector {
    spec: ConnectionSpec,
    schema: String,
    timeout: Duration,
}

impl OracleIntrospector {
    pub fn new(spec: ConnectionSpec, schema: String, timeout: Duration) -> Self {
        Self {
            spec,
            schema,
            timeout,
        }
    }

    /// Easy Connect string: `//host:port/service`.
    fn connect_string(&self) -> String {
        format!("//{}:{}/{}", self.spec.host, self.spec.port(), self.spec.database)
    }
}

fn is_call_timeout(err: &oracle::Error) -> bool {
    err.to_string().contains("DPI-1067")
}

fn to_oracle_param(param: &SqlParam) -> Box<dyn ToSql + Send> {
    match param {
        SqlParam::Null => Box::new(Option::<String>::None),
        SqlParam::Bool(b) => Box::new(i64::from(*b)),
        SqlParam::Int(i) => Box::new(*i),
        SqlParam::Float(f) => Box::new(*f),
        SqlParam::Text(s) => Box::new(s.clone()),
    }
}

fn extract_value(value: &SqlValue) -> CellValue {
    if value.is_null().unwrap_or(true) {
        return CellValue::Null;
    }

    match value.oracle_type() {
        Ok(OracleType::Number(_, _)) => match value.get::<String>() {
            Ok(s) => s
                .parse::<i64>()
                .map(CellValue::Int)
                .or_else(|_| s.parse::<f64>().map(CellValue::Float))
                .unwrap_or(CellValue::Text(s)),
            Err(_) => CellValue::Null,
        },
        Ok(OracleType::BinaryFloat) | Ok(OracleType::BinaryDouble) => value
            .get::<f64>()
            .map(CellValue::Float)
            .unwrap_or(CellValue::Null),
        _ => value
            .get::<String>()
            .map(CellValue::Text)
            .unwrap_or(CellValue::Null),
    }
}

fn query(conn: &Connection, sql: &str, params: &[SqlParam]) -> oracle::Result<TabularResult> {
    let bound: Vec<Box<dyn ToSql + Send>> = params.iter().map(to_oracle_param).collect();
    let refs: Vec<&dyn ToSql> = bound.iter().map(|p| p.as_ref() as &dyn ToSql).collect();

    let result_set = conn.query(sql, &refs)?;
    let columns: Vec<String> = result_set
        .column_info()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for row in result_set {
        let row = row?;
        rows.push(row.sql_values().iter().map(extract_value).collect());
    }

    Ok(TabularResult::new(columns, rows))
}

fn run_blocking(
    spec: &ConnectionSpec,
    connect_string: &str,
    sql: &str,
    params: &[SqlParam],
    timeout: Duration,
) -> IntrospectResult<TabularResult> {
    let username = spec.username.as_deref().unwrap_or_default();
    let password = spec.password.as_deref().unwrap_or_default();

    let conn = Connection::connect(username, password, connect_string)
        .map_err(|e| IntrospectError::connection(Dialect::Oracle, connect_string, e))?;
    conn.set_call_timeout(Some(timeout))
        .map_err(|e| IntrospectError::connection(Dialect::Oracle, connect_string, e))?;

    let result = query(&conn, sql, params);

    if let Err(e) = conn.close() {
        debug!(error = %e, "oracle close failed");
    }

    result.map_err(|e| {
        if is_call_timeout(&e) {
            IntrospectError::Timeout {
                dialect: Dialect::Oracle,
                operation: "query",
                after: timeout,
            }
        } else {
            IntrospectError::query(Dialect::Oracle, e)
        }
    })
}

#[async_trait]
impl SchemaIntrospector for OracleIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn run_query(&self, sql: &str, params: &[SqlParam]) -> IntrospectResult<TabularResult> {
        let spec = self.spec.clone();
        let connect_string = self.connect_string();
        let sql = sql.to_string();
        let params = params.to_vec();
        let timeout = self.timeout;

        let task = tokio::task::spawn_blocking(move || {
            run_blocking(&spec, &connect_string, &sql, &params, timeout)
        });

        match tokio::time::timeout(timeout + POOL_GRACE, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(IntrospectError::Internal(format!(
                "oracle worker failed: {}",
                join_err
            ))),
            Err(_) => Err(IntrospectError::Timeout {
                dialect: Dialect::Oracle,
                operation: "query",
                after: timeout,
            }),
        }
    }
}
