//! PostgreSQL introspection over tokio-postgres.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, warn};

use super::pg_types::{bind_param, BoundParam, PgCell};
use super::{
    with_timeout, CellValue, IntrospectError, IntrospectResult, SchemaIntrospector, SqlParam,
    TabularResult,
};
use crate::config::ConnectionSpec;
use crate::sql::dialect::Dialect;

/// PostgreSQL introspector. Opens one connection per call.
pub struct PostgresIntrospector {
    spec: ConnectionSpec,
    schema: String,
    timeout: Duration,
}

/// Aborts the spawned connection task when dropped, closing the socket.
struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl PostgresIntrospector {
    pub fn new(spec: ConnectionSpec, schema: String, timeout: Duration) -> Self {
        Self {
            spec,
            schema,
            timeout,
        }
    }

    fn target(&self) -> String {
        format!("{}:{}/{}", self.spec.host, self.spec.port(), self.spec.database)
    }

    fn config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.spec.host)
            .port(self.spec.port())
            .dbname(&self.spec.database)
            .connect_timeout(self.timeout);
        if let Some(user) = &self.spec.username {
            config.user(user);
        }
        if let Some(password) = &self.spec.password {
            config.password(password);
        }
        config
    }

    async fn connect(&self) -> IntrospectResult<(Client, ConnectionGuard)> {
        let (client, connection) = self
            .config()
            .connect(NoTls)
            .await
            .map_err(|e| IntrospectError::connection(Dialect::Postgresql, self.target(), e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection closed with error");
            }
        });

        Ok((client, ConnectionGuard(handle)))
    }
}

fn query_error(err: tokio_postgres::Error) -> IntrospectError {
    // Server-reported errors carry a SQLSTATE; anything else is the link failing
    if err.code().is_some() {
        IntrospectError::query(Dialect::Postgresql, err)
    } else if err.is_closed() {
        IntrospectError::connection(Dialect::Postgresql, "closed connection", err)
    } else {
        IntrospectError::query(Dialect::Postgresql, err)
    }
}

/// Bind each parameter to the type the prepared statement declares for it.
fn bind_params(types: &[Type], params: &[SqlParam]) -> IntrospectResult<Vec<BoundParam>> {
    if types.len() != params.len() {
        return Err(IntrospectError::query(
            Dialect::Postgresql,
            format!(
                "statement expects {} parameters but {} were given",
                types.len(),
                params.len()
            ),
        ));
    }

    types
        .iter()
        .zip(params)
        .map(|(ty, param)| bind_param(param, ty))
        .collect::<Result<_, _>>()
        .map_err(|e| IntrospectError::query(Dialect::Postgresql, e))
}

fn extract_row(row: &Row) -> Result<Vec<CellValue>, tokio_postgres::Error> {
    (0..row.len())
        .map(|idx| {
            row.try_get::<_, Option<PgCell>>(idx)
                .map(|cell| cell.map_or(CellValue::Null, |c| c.0))
        })
        .collect()
}

#[async_trait]
impl SchemaIntrospector for PostgresIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::Postgresql
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn run_query(&self, sql: &str, params: &[SqlParam]) -> IntrospectResult<TabularResult> {
        let (client, _guard) =
            with_timeout(Dialect::Postgresql, "connect", self.timeout, self.connect()).await?;
        let cancel = client.cancel_token();

        let execute = async {
            let statement = client.prepare(sql).await.map_err(query_error)?;
            let columns: Vec<String> = statement
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect();

            let bound = bind_params(statement.params(), params)?;
            let refs: Vec<&(dyn ToSql + Sync)> = bound
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();

            let rows = client.query(&statement, &refs).await.map_err(query_error)?;
            let rows = rows
                .iter()
                .map(extract_row)
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_error)?;

            Ok(TabularResult::new(columns, rows))
        };

        let result = with_timeout(Dialect::Postgresql, "query", self.timeout, execute).await;

        if matches!(result, Err(IntrospectError::Timeout { .. })) {
            // The server keeps running the statement unless told otherwise
            tokio::spawn(async move {
                if let Err(e) = cancel.cancel_query(NoTls).await {
                    debug!(error = %e, "failed to cancel timed out postgres query");
                }
            });
        }

        debug!(
            dialect = "postgresql",
            ok = result.is_ok(),
            "query finished"
        );
        result
    }
}
