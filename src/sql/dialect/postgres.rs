//! PostgreSQL catalog dialect.
//!
//! PostgreSQL specifics:
//! - `$n` placeholders
//! - Schema-qualified catalogs, so a schema must always be named
//! - `information_schema` views use domain types (`sql_identifier`,
//!   `cardinal_number`), which are cast to plain `text`/`int8` here

use sqlparser::dialect::PostgreSqlDialect;

use super::helpers;
use super::CatalogDialect;

/// PostgreSQL catalog dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl CatalogDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_dollar(index)
    }

    fn default_port(&self) -> u16 {
        5432
    }

    fn default_schema(&self, _database: &str) -> Option<String> {
        None
    }

    fn columns_query(&self) -> String {
        format!(
            "SELECT \
                c.table_name::text AS table_name, \
                c.column_name::text AS column_name, \
                c.data_type::text AS data_type, \
                c.is_nullable::text AS is_nullable, \
                c.character_maximum_length::int8 AS character_maximum_length, \
                c.numeric_precision::int8 AS numeric_precision, \
                c.numeric_scale::int8 AS numeric_scale, \
                tc.constraint_type::text AS constraint_type, \
                c.column_default::text AS column_default, \
                c.ordinal_position::int8 AS ordinal_position \
            FROM information_schema.columns c \
            LEFT JOIN information_schema.key_column_usage kcu \
                ON c.table_name = kcu.table_name \
                AND c.column_name = kcu.column_name \
                AND c.table_schema = kcu.table_schema \
            LEFT JOIN information_schema.table_constraints tc \
                ON tc.constraint_name = kcu.constraint_name \
                AND tc.table_schema = kcu.table_schema \
            WHERE c.table_name = {}::text \
                AND c.table_schema = {}::text \
            ORDER BY c.ordinal_position, tc.constraint_type",
            self.placeholder(1),
            self.placeholder(2)
        )
    }

    fn tables_query(&self) -> String {
        format!(
            "SELECT table_name::text AS table_name \
            FROM information_schema.tables \
            WHERE table_schema = {}::text AND table_type = 'BASE TABLE' \
            ORDER BY table_name",
            self.placeholder(1)
        )
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(PostgreSqlDialect {})
    }
}
