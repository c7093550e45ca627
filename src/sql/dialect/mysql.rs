//! MySQL catalog dialect.
//!
//! MySQL specifics:
//! - Anonymous `?` placeholders
//! - A schema is a database, so the database name is the default schema
//! - `COLUMN_TYPE` carries the full declared type (`varchar(255)`, `int unsigned`)

use sqlparser::dialect::MySqlDialect;

use super::helpers;
use super::CatalogDialect;

/// MySQL catalog dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl CatalogDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_question(index)
    }

    fn default_port(&self) -> u16 {
        3306
    }

    fn default_schema(&self, database: &str) -> Option<String> {
        Some(database.to_string())
    }

    fn columns_query(&self) -> String {
        format!(
            "SELECT \
                c.TABLE_NAME AS table_name, \
                c.COLUMN_NAME AS column_name, \
                c.COLUMN_TYPE AS data_type, \
                c.IS_NULLABLE AS is_nullable, \
                c.CHARACTER_MAXIMUM_LENGTH AS character_maximum_length, \
                c.NUMERIC_PRECISION AS numeric_precision, \
                c.NUMERIC_SCALE AS numeric_scale, \
                tc.CONSTRAINT_TYPE AS constraint_type, \
                c.COLUMN_DEFAULT AS column_default, \
                c.ORDINAL_POSITION AS ordinal_position \
            FROM information_schema.COLUMNS c \
            LEFT JOIN information_schema.KEY_COLUMN_USAGE kcu \
                ON kcu.TABLE_SCHEMA = c.TABLE_SCHEMA \
                AND kcu.TABLE_NAME = c.TABLE_NAME \
                AND kcu.COLUMN_NAME = c.COLUMN_NAME \
            LEFT JOIN information_schema.TABLE_CONSTRAINTS tc \
                ON tc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA \
                AND tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
                AND tc.TABLE_NAME = kcu.TABLE_NAME \
            WHERE c.TABLE_NAME = {} AND c.TABLE_SCHEMA = {} \
            ORDER BY c.ORDINAL_POSITION, tc.CONSTRAINT_TYPE",
            self.placeholder(1),
            self.placeholder(2)
        )
    }

    fn tables_query(&self) -> String {
        format!(
            "SELECT TABLE_NAME AS table_name \
            FROM information_schema.TABLES \
            WHERE TABLE_SCHEMA = {} AND TABLE_TYPE = 'BASE TABLE' \
            ORDER BY TABLE_NAME",
            self.placeholder(1)
        )
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(MySqlDialect {})
    }
}
