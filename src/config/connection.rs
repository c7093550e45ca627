//! Database connection specification.
//!
//! Supports configuration via environment variables:
//! - `TXT2SQL_DB_DIALECT`: Database dialect (postgresql, mysql, oracle, sqlite)
//! - `TXT2SQL_DB_HOST`: Database server hostname
//! - `TXT2SQL_DB_NAME`: Database name (file path for SQLite)
//! - `TXT2SQL_DB_PORT`: Port (optional, uses dialect default)
//! - `TXT2SQL_DB_SCHEMA`: Schema (optional for MySQL, Oracle and SQLite)

use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql::dialect::{CatalogDialect, Dialect, UnsupportedDialect};

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error(transparent)]
    UnsupportedDialect(#[from] UnsupportedDialect),

    #[error("A schema name is required for {0}")]
    MissingSchema(Dialect),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// How to reach one relational database, and which tables to read.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// Database dialect.
    pub dialect: Dialect,
    /// Server hostname. Unused for SQLite.
    #[serde(default)]
    pub host: String,
    /// Port (optional, uses dialect default).
    #[serde(default)]
    pub port: Option<u16>,
    /// Username.
    #[serde(default)]
    pub username: Option<String>,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
    /// Database name, Oracle service name, or SQLite file path.
    pub database: String,
    /// Schema (owner on Oracle).
    #[serde(default)]
    pub schema_name: Option<String>,
    /// Tables to extract.
    #[serde(default)]
    pub tables: Vec<String>,
}

// Keep credentials out of logs.
impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("schema_name", &self.schema_name)
            .field("tables", &self.tables)
            .finish()
    }
}

impl ConnectionSpec {
    /// Create a spec for a networked database.
    pub fn new(dialect: Dialect, host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            dialect,
            host: host.into(),
            port: None,
            username: None,
            password: None,
            database: database.into(),
            schema_name: None,
            tables: Vec::new(),
        }
    }

    /// Create a spec for a SQLite database file.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new(Dialect::Sqlite, String::new(), path)
    }

    /// Set the credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema_name = Some(schema.into());
        self
    }

    /// Set the tables to extract.
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Port to connect to, falling back to the dialect default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.dialect.default_port())
    }

    /// Schema to introspect.
    ///
    /// PostgreSQL requires an explicit schema; the others default to the
    /// database name (or `main` for SQLite).
    pub fn schema(&self) -> Result<String, ConnectionConfigError> {
        self.dialect
            .resolve_schema(self.schema_name.as_deref(), &self.database)
            .ok_or(ConnectionConfigError::MissingSchema(self.dialect))
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `TXT2SQL_DB_DIALECT`: postgresql, mysql, oracle or sqlite
    /// - `TXT2SQL_DB_NAME`: Database name (file path for SQLite)
    /// - `TXT2SQL_DB_HOST`: Server hostname (not required for SQLite)
    ///
    /// Optional:
    /// - `TXT2SQL_DB_PORT`, `TXT2SQL_DB_USER`, `TXT2SQL_DB_PASSWORD`, `TXT2SQL_DB_SCHEMA`
    pub fn from_env() -> Result<Self, ConnectionConfigError> {
        let dialect_str = env::var("TXT2SQL_DB_DIALECT")
            .map_err(|_| ConnectionConfigError::MissingEnvVar("TXT2SQL_DB_DIALECT".to_string()))?;

        let dialect: Dialect = dialect_str.parse()?;

        let database = env::var("TXT2SQL_DB_NAME")
            .map_err(|_| ConnectionConfigError::MissingEnvVar("TXT2SQL_DB_NAME".to_string()))?;

        // Host is meaningless for a SQLite file
        let host = match dialect {
            Dialect::Sqlite => env::var("TXT2SQL_DB_HOST").unwrap_or_default(),
            _ => env::var("TXT2SQL_DB_HOST")
                .map_err(|_| ConnectionConfigError::MissingEnvVar("TXT2SQL_DB_HOST".to_string()))?,
        };

        let port = match env::var("TXT2SQL_DB_PORT") {
            Ok(p) => Some(p.parse().map_err(|_| {
                ConnectionConfigError::InvalidConfig(format!("TXT2SQL_DB_PORT is not a port: {}", p))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            dialect,
            host,
            port,
            username: env::var("TXT2SQL_DB_USER").ok(),
            password: env::var("TXT2SQL_DB_PASSWORD").ok(),
            database,
            schema_name: env::var("TXT2SQL_DB_SCHEMA").ok(),
            tables: Vec::new(),
        })
    }
}
