//! Multi-dialect schema introspection.
//!
//! `SchemaIntrospector` presents one contract over every supported engine:
//! list tables, extract column metadata, and run arbitrary parameterized
//! queries. One implementation exists per dialect and is chosen once by
//! [`introspector`].
//!
//! Connections are opened per call and released on every exit path. Every
//! call is bounded by the configured timeout, and a timeout aborts the
//! underlying operation (server-side cancel on PostgreSQL, interrupt on
//! SQLite, call timeout on Oracle, dropped socket on MySQL).
//!
//! # Example
//!
//! ```ignore
//! use txt2sql::introspect::introspector;
//!
//! let db = introspector(&spec, Duration::from_secs(20))?;
//! let tables = db.list_tables().await?;
//! let columns = db.extract_columns("customers").await?;
//! ```

mod mysql;
mod oracle;
mod pg_types;
mod postgres;
mod sqlite;
mod value;

pub use mysql::MySqlIntrospector;
pub use oracle::OracleIntrospector;
pub use postgres::PostgresIntrospector;
pub use sqlite::SqliteIntrospector;
pub use value::{hex_bytes, CellValue, SqlParam, TabularResult};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ConnectionConfigError, ConnectionSpec};
use crate::schema::{ColumnRecord, SchemaDocument};
use crate::sql::dialect::{CatalogDialect, Dialect, UnsupportedDialect};

/// Boxed driver error, kept as the source of connection and query failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while talking to a relational engine.
#[derive(Debug, thiserror::Error)]
pub enum IntrospectError {
    #[error(transparent)]
    UnsupportedDialect(#[from] UnsupportedDialect),

    #[error("Failed to connect to {dialect} database at {target}")]
    Connection {
        dialect: Dialect,
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("Query failed on {dialect}: {message}")]
    Query {
        dialect: Dialect,
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("{dialect} {operation} timed out after {after:?}")]
    Timeout {
        dialect: Dialect,
        operation: &'static str,
        after: Duration,
    },

    #[error("Invalid connection specification: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntrospectError {
    pub(crate) fn connection(
        dialect: Dialect,
        target: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        IntrospectError::Connection {
            dialect,
            target: target.into(),
            source: source.into(),
        }
    }

    pub(crate) fn query(dialect: Dialect, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        IntrospectError::Query {
            dialect,
            message: source.to_string(),
            source,
        }
    }
}

impl From<ConnectionConfigError> for IntrospectError {
    fn from(err: ConnectionConfigError) -> Self {
        match err {
            ConnectionConfigError::UnsupportedDialect(e) => IntrospectError::UnsupportedDialect(e),
            other => IntrospectError::InvalidInput(other.to_string()),
        }
    }
}

/// Result type for introspection operations.
pub type IntrospectResult<T> = Result<T, IntrospectError>;

/// Bound `fut` by `after`, turning expiry into a typed timeout.
///
/// The future is dropped on expiry, which closes any socket it owns.
pub(crate) async fn with_timeout<T, F>(
    dialect: Dialect,
    operation: &'static str,
    after: Duration,
    fut: F,
) -> IntrospectResult<T>
where
    F: Future<Output = IntrospectResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(IntrospectError::Timeout {
            dialect,
            operation,
            after,
        }),
    }
}

/// Schema introspection over one database.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Dialect of the connected engine.
    fn dialect(&self) -> Dialect;

    /// Schema (owner on Oracle) that catalog queries are filtered by.
    fn schema(&self) -> &str;

    /// Execute `sql` with positional `params` and materialize every row.
    ///
    /// Placeholders follow the dialect: `$1`, `?`, `:1` or `?1`.
    async fn run_query(&self, sql: &str, params: &[SqlParam]) -> IntrospectResult<TabularResult>;

    /// List base tables in the schema, sorted by name.
    async fn list_tables(&self) -> IntrospectResult<Vec<String>> {
        let dialect = self.dialect();
        let params = [SqlParam::from(dialect.fold_identifier(self.schema()))];
        let result = self.run_query(&dialect.tables_query(), &params).await?;

        Ok(result
            .rows()
            .iter()
            .filter_map(|row| row.first().and_then(CellValue::to_text))
            .collect())
    }

    /// Column metadata for `table`, ordered by ordinal position.
    ///
    /// An unknown table yields an empty list.
    async fn extract_columns(&self, table: &str) -> IntrospectResult<Vec<ColumnRecord>> {
        let dialect = self.dialect();
        let params = [
            SqlParam::from(dialect.fold_identifier(table)),
            SqlParam::from(dialect.fold_identifier(self.schema())),
        ];
        let result = self.run_query(&dialect.columns_query(), &params).await?;
        Ok(ColumnRecord::from_catalog(&result))
    }

    /// Extract several tables concurrently into one document.
    ///
    /// Default implementation fetches tables in parallel using `join_all`.
    async fn extract_schema(&self, tables: &[String]) -> IntrospectResult<SchemaDocument> {
        let futures: Vec<_> = tables
            .iter()
            .map(|table| self.extract_columns(table))
            .collect();

        let results = futures::future::join_all(futures).await;

        let mut document = SchemaDocument::new(self.dialect());
        for (table, columns) in tables.iter().zip(results) {
            document.insert(table.clone(), columns?);
        }
        Ok(document)
    }
}

/// Build the introspector for `spec`'s dialect.
///
/// Fails with `InvalidInput` when the dialect needs an explicit schema and
/// none was given.
pub fn introspector(
    spec: &ConnectionSpec,
    timeout: Duration,
) -> IntrospectResult<Box<dyn SchemaIntrospector>> {
    let schema = spec.schema()?;
    let spec = spec.clone();

    Ok(match spec.dialect {
        Dialect::Postgresql => Box::new(PostgresIntrospector::new(spec, schema, timeout)),
        Dialect::Mysql => Box::new(MySqlIntrospector::new(spec, schema, timeout)),
        Dialect::Oracle => Box::new(OracleIntrospector::new(spec, schema, timeout)),
        Dialect::Sqlite => Box::new(SqliteIntrospector::new(spec, schema, timeout)),
    })
}
