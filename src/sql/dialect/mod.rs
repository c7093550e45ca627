//! Catalog dialect definitions.
//!
//! Each relational engine differs in how it is reached and how its catalog is
//! queried. `CatalogDialect` captures those differences:
//!
//! - Placeholder style: `$1` (PostgreSQL), `?` (MySQL), `:1` (Oracle), `?1` (SQLite)
//! - Catalog source: `information_schema` vs `all_tab_columns` vs `pragma_table_info`
//! - Identifier folding: Oracle stores unquoted names upper-case
//! - Schema defaults: MySQL/Oracle fall back to the database name
//!
//! # Usage
//!
//! ```ignore
//! use txt2sql::sql::dialect::{CatalogDialect, Dialect};
//!
//! let dialect: Dialect = "postgresql".parse()?;
//! assert_eq!(dialect.placeholder(1), "$1");
//! ```
//!
//! Every catalog query returns the same normalized column set so that one
//! row mapper serves all dialects:
//!
//! | column | meaning |
//! |--------|---------|
//! | `table_name` | owning table |
//! | `column_name` | column |
//! | `data_type` | engine type name |
//! | `is_nullable` | `YES`/`NO` (`Y`/`N` on Oracle) |
//! | `character_maximum_length` | char length, if any |
//! | `numeric_precision` | numeric precision, if any |
//! | `numeric_scale` | numeric scale, if any |
//! | `constraint_type` | `PRIMARY KEY`, `UNIQUE`, `FOREIGN KEY`, ... |
//! | `column_default` | default expression text |
//! | `ordinal_position` | 1-based position |

pub mod helpers;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;

pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a dialect string names no supported engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported dialect: {0}. Supported: postgresql, mysql, oracle, sqlite")]
pub struct UnsupportedDialect(pub String);

/// Catalog dialect trait - defines how one engine's metadata is queried.
pub trait CatalogDialect: fmt::Debug + Send + Sync {
    /// Dialect name, used as the namespace prefix.
    fn name(&self) -> &'static str;

    /// Positional placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Default TCP port. Zero for file-based engines.
    fn default_port(&self) -> u16;

    /// Schema used when the caller gives none.
    ///
    /// `None` means the dialect has schema-qualified catalogs and the caller
    /// must name the schema explicitly.
    fn default_schema(&self, database: &str) -> Option<String>;

    /// Fold an unquoted identifier the way the catalog stores it.
    fn fold_identifier(&self, ident: &str) -> String {
        ident.to_string()
    }

    /// Column metadata query. Binds `(table, schema)`.
    fn columns_query(&self) -> String;

    /// Table listing query. Binds `(schema)`.
    fn tables_query(&self) -> String;

    /// Parser dialect used to validate generated SQL.
    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect>;
}

/// Supported relational engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Dialect {
    Postgresql,
    Mysql,
    Oracle,
    Sqlite,
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 4] = [
        Dialect::Postgresql,
        Dialect::Mysql,
        Dialect::Oracle,
        Dialect::Sqlite,
    ];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn CatalogDialect {
        match self {
            Dialect::Postgresql => &Postgres,
            Dialect::Mysql => &MySql,
            Dialect::Oracle => &Oracle,
            Dialect::Sqlite => &Sqlite,
        }
    }

    /// Resolve the schema to introspect.
    ///
    /// Returns `None` when no schema was given and the dialect has no default.
    pub fn resolve_schema(&self, schema: Option<&str>, database: &str) -> Option<String> {
        match schema.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(s.to_string()),
            None => self.default_schema(database),
        }
    }
}

impl FromStr for Dialect {
    type Err = UnsupportedDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(Dialect::Postgresql),
            "mysql" => Ok(Dialect::Mysql),
            "oracle" => Ok(Dialect::Oracle),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(UnsupportedDialect(other.to_string())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = UnsupportedDialect;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Implement CatalogDialect for Dialect enum by delegating to concrete types
impl CatalogDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn placeholder(&self, index: usize) -> String {
        self.dialect().placeholder(index)
    }

    fn default_port(&self) -> u16 {
        self.dialect().default_port()
    }

    fn default_schema(&self, database: &str) -> Option<String> {
        self.dialect().default_schema(database)
    }

    fn fold_identifier(&self, ident: &str) -> String {
        self.dialect().fold_identifier(ident)
    }

    fn columns_query(&self) -> String {
        self.dialect().columns_query()
    }

    fn tables_query(&self) -> String {
        self.dialect().tables_query()
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        self.dialect().parser_dialect()
    }
}
