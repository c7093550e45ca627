//! MySQL introspection over mysql_async.

use std::time::Duration;

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, OptsBuilder, Params, Row, Value};
use tracing::debug;

use super::{
    hex_bytes, with_timeout, CellValue, IntrospectError, IntrospectResult, SchemaIntrospector,
    SqlParam, TabularResult,
};
use crate::config::ConnectionSpec;
use crate::sql::dialect::Dialect;

/// MySQL introspector. Opens one connection per call.
pub struct MySqlIntrospector {
    spec: ConnectionSpec,
    schema: String,
    timeout: Duration,
}

impl MySqlIntrospector {
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

    fn opts(&self) -> OptsBuilder {
        OptsBuilder::default()
            .ip_or_hostname(self.spec.host.clone())
            .tcp_port(self.spec.port())
            .user(self.spec.username.clone())
            .pass(self.spec.password.clone())
            .db_name(Some(self.spec.database.clone()))
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> IntrospectResult<TabularResult> {
        let mut conn = Conn::new(self.opts())
            .await
            .map_err(|e| IntrospectError::connection(Dialect::Mysql, self.target(), e))?;

        let result = fetch(&mut conn, sql, to_params(params)).await;

        // Release before inspecting the outcome so error paths disconnect too
        if let Err(e) = conn.disconnect().await {
            debug!(error = %e, "mysql disconnect failed");
        }

        let (columns, rows) = result.map_err(query_error)?;
        Ok(tabulate(&columns, &rows))
    }
}

/// Run `sql` and collect the first result set with its column metadata.
///
/// Columns are read from the result set header, so an empty result still
/// reports them.
async fn fetch(
    conn: &mut Conn,
    sql: &str,
    params: Params,
) -> mysql_async::Result<(Vec<Column>, Vec<Row>)> {
    let result = conn.exec_iter(sql, params).await?;
    let columns = result.columns_ref().to_vec();
    let rows = result.collect_and_drop::<Row>().await?;
    Ok((columns, rows))
}

fn tabulate(columns: &[Column], rows: &[Row]) -> TabularResult {
    let names = columns
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();

    let rows = rows
        .iter()
        .map(|row| {
            (0..row.len())
                .map(|idx| row.as_ref(idx).map(extract_value).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    TabularResult::new(names, rows)
}

fn query_error(err: mysql_async::Error) -> IntrospectError {
    match err {
        mysql_async::Error::Server(_) | mysql_async::Error::Driver(_) => {
            IntrospectError::query(Dialect::Mysql, err)
        }
        other => IntrospectError::connection(Dialect::Mysql, "established connection", other),
    }
}

fn to_params(params: &[SqlParam]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }

    Params::Positional(
        params
            .iter()
            .map(|p| match p {
                SqlParam::Null => Value::NULL,
                SqlParam::Bool(b) => Value::Int(i64::from(*b)),
                SqlParam::Int(i) => Value::Int(*i),
                SqlParam::Float(f) => Value::Double(*f),
                SqlParam::Text(s) => Value::Bytes(s.clone().into_bytes()),
            })
            .collect(),
    )
}

fn extract_value(value: &Value) -> CellValue {
    match value {
        Value::NULL => CellValue::Null,
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => CellValue::Text(s.to_string()),
            Err(_) => CellValue::Text(hex_bytes(bytes)),
        },
        Value::Int(i) => CellValue::Int(*i),
        Value::UInt(u) => match i64::try_from(*u) {
            Ok(i) => CellValue::Int(i),
            Err(_) => CellValue::Text(u.to_string()),
        },
        Value::Float(f) => CellValue::Float(f64::from(*f)),
        Value::Double(d) => CellValue::Float(*d),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let mut s = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            );
            if *micros > 0 {
                s.push_str(&format!(".{:06}", micros));
            }
            CellValue::Text(s)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = u64::from(*days) * 24 + u64::from(*hours);
            let mut s = format!(
                "{}{:02}:{:02}:{:02}",
                if *negative { "-" } else { "" },
                total_hours,
                minutes,
                seconds
            );
            if *micros > 0 {
                s.push_str(&format!(".{:06}", micros));
            }
            CellValue::Text(s)
        }
    }
}

#[async_trait]
impl SchemaIntrospector for MySqlIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn run_query(&self, sql: &str, params: &[SqlParam]) -> IntrospectResult<TabularResult> {
        // Dropping the connection on expiry closes its socket
        with_timeout(Dialect::Mysql, "query", self.timeout, self.execute(sql, params)).await
    }
}
