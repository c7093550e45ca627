//! Oracle catalog dialect.
//!
//! Oracle specifics:
//! - `:n` placeholders
//! - Unquoted identifiers are stored upper-case, so table and owner are folded
//! - Catalog lives in `ALL_TAB_COLUMNS`/`ALL_CONSTRAINTS` rather than `information_schema`
//! - Nullability is reported as `Y`/`N`

use sqlparser::dialect::GenericDialect;

use super::helpers;
use super::CatalogDialect;

/// Oracle catalog dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl CatalogDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_colon(index)
    }

    fn default_port(&self) -> u16 {
        1521
    }

    fn default_schema(&self, database: &str) -> Option<String> {
        Some(helpers::fold_upper(database))
    }

    fn fold_identifier(&self, ident: &str) -> String {
        helpers::fold_upper(ident)
    }

    fn columns_query(&self) -> String {
        format!(
            "SELECT \
                c.table_name AS table_name, \
                c.column_name AS column_name, \
                c.data_type AS data_type, \
                c.nullable AS is_nullable, \
                CASE WHEN c.char_length > 0 THEN c.char_length END AS character_maximum_length, \
                c.data_precision AS numeric_precision, \
                c.data_scale AS numeric_scale, \
                {} AS constraint_type, \
                c.data_default AS column_default, \
                c.column_id AS ordinal_position \
            FROM all_tab_columns c \
            LEFT JOIN ( \
                SELECT cc.owner, cc.table_name, cc.column_name, ac.constraint_type \
                FROM all_cons_columns cc \
                JOIN all_constraints ac \
                    ON ac.owner = cc.owner AND ac.constraint_name = cc.constraint_name \
                WHERE ac.constraint_type IN ('P', 'U', 'R') \
            ) k \
                ON k.owner = c.owner \
                AND k.table_name = c.table_name \
                AND k.column_name = c.column_name \
            WHERE c.table_name = {} AND c.owner = {} \
            ORDER BY c.column_id, k.constraint_type",
            helpers::ORACLE_CONSTRAINT_CASE,
            self.placeholder(1),
            self.placeholder(2)
        )
    }

    fn tables_query(&self) -> String {
        format!(
            "SELECT table_name AS table_name \
            FROM all_tables \
            WHERE owner = {} \
            ORDER BY table_name",
            self.placeholder(1)
        )
    }

    // sqlparser has no Oracle dialect
    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(GenericDialect {})
    }
}
