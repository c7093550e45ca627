//! SQLite catalog dialect.
//!
//! SQLite specifics:
//! - `?n` placeholders, reusable within one statement
//! - The "database" is a file path and the schema is an attached database name (`main`)
//! - Metadata comes from the `pragma_table_info`/`pragma_foreign_key_list`
//!   table-valued functions, which return no rows for an unknown table

use sqlparser::dialect::SQLiteDialect;

use super::helpers;
use super::CatalogDialect;

/// SQLite catalog dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl CatalogDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_numbered_question(index)
    }

    fn default_port(&self) -> u16 {
        0 // Not applicable
    }

    fn default_schema(&self, _database: &str) -> Option<String> {
        Some("main".to_string())
    }

    fn columns_query(&self) -> String {
        let (table, schema) = (self.placeholder(1), self.placeholder(2));
        format!(
            "SELECT \
                {table} AS table_name, \
                p.name AS column_name, \
                p.type AS data_type, \
                CASE WHEN p.\"notnull\" = 0 AND p.pk = 0 THEN 'YES' ELSE 'NO' END AS is_nullable, \
                NULL AS character_maximum_length, \
                NULL AS numeric_precision, \
                NULL AS numeric_scale, \
                CASE \
                    WHEN p.pk > 0 THEN 'PRIMARY KEY' \
                    WHEN EXISTS ( \
                        SELECT 1 FROM pragma_foreign_key_list({table}, {schema}) f \
                        WHERE f.\"from\" = p.name \
                    ) THEN 'FOREIGN KEY' \
                END AS constraint_type, \
                p.dflt_value AS column_default, \
                p.cid + 1 AS ordinal_position \
            FROM pragma_table_info({table}, {schema}) p \
            ORDER BY p.cid"
        )
    }

    fn tables_query(&self) -> String {
        format!(
            "SELECT name AS table_name \
            FROM pragma_table_list \
            WHERE schema = {} AND type = 'table' AND name NOT LIKE 'sqlite_%' \
            ORDER BY name",
            self.placeholder(1)
        )
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(SQLiteDialect {})
    }
}
