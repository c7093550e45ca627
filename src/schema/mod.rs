//! Extracted schema metadata and its index representation.
//!
//! - [`ColumnRecord`] - one column as reported by a catalog query
//! - [`SchemaDocument`] - table name to ordered columns
//! - [`chunk`] - splitting a document into retrievable chunks
//! - [`namespace`] - deterministic index namespaces for table sets

pub mod chunk;
pub mod namespace;

pub use chunk::{IndexChunk, SchemaDocumentBuilder};
pub use namespace::{Namespace, NamespaceKeyer};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::introspect::{CellValue, TabularResult};
use crate::sql::dialect::Dialect;

/// One column of a table.
///
/// Serialized with `information_schema` names so the indexed text reads like
/// the catalog it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRecord {
    #[serde(rename = "table_name")]
    pub table: String,
    #[serde(rename = "column_name")]
    pub column: String,
    pub data_type: String,
    #[serde(rename = "is_nullable")]
    pub nullable: bool,
    #[serde(rename = "character_maximum_length")]
    pub length: Option<i64>,
    #[serde(rename = "numeric_precision")]
    pub precision: Option<i64>,
    #[serde(rename = "numeric_scale")]
    pub scale: Option<i64>,
    pub constraint_type: Option<String>,
    #[serde(rename = "column_default")]
    pub default: Option<String>,
    pub ordinal_position: i64,
}

impl ColumnRecord {
    /// Map the normalized catalog column set to records.
    ///
    /// A column in several constraints arrives as several adjacent rows; they
    /// are merged into one record listing each distinct constraint kind.
    pub fn from_catalog(result: &TabularResult) -> Vec<ColumnRecord> {
        let idx = |name: &str| result.column_index(name);
        let (
            Some(table_idx),
            Some(column_idx),
            Some(type_idx),
            Some(nullable_idx),
            Some(position_idx),
        ) = (
            idx("table_name"),
            idx("column_name"),
            idx("data_type"),
            idx("is_nullable"),
            idx("ordinal_position"),
        )
        else {
            return Vec::new();
        };
        let length_idx = idx("character_maximum_length");
        let precision_idx = idx("numeric_precision");
        let scale_idx = idx("numeric_scale");
        let constraint_idx = idx("constraint_type");
        let default_idx = idx("column_default");

        let cell = |row: &[CellValue], i: Option<usize>| -> Option<CellValue> {
            i.and_then(|i| row.get(i)).cloned().filter(|c| !c.is_null())
        };

        let mut records: Vec<ColumnRecord> = Vec::new();
        for row in result.rows() {
            let Some(column) = cell(row, Some(column_idx)).and_then(|c| c.to_text()) else {
                continue;
            };
            let table = cell(row, Some(table_idx))
                .and_then(|c| c.to_text())
                .unwrap_or_default();
            let ordinal_position = cell(row, Some(position_idx))
                .and_then(|c| c.as_i64())
                .unwrap_or(records.len() as i64 + 1);
            let constraint_type = cell(row, constraint_idx).and_then(|c| c.to_text());

            if let Some(last) = records.last_mut() {
                if last.table == table && last.ordinal_position == ordinal_position {
                    last.add_constraint(constraint_type);
                    continue;
                }
            }

            records.push(ColumnRecord {
                table,
                column,
                data_type: cell(row, Some(type_idx))
                    .and_then(|c| c.to_text())
                    .unwrap_or_default(),
                nullable: cell(row, Some(nullable_idx))
                    .and_then(|c| c.to_text())
                    .map(|s| parse_nullable(&s))
                    .unwrap_or(true),
                length: cell(row, length_idx).and_then(|c| c.as_i64()),
                precision: cell(row, precision_idx).and_then(|c| c.as_i64()),
                scale: cell(row, scale_idx).and_then(|c| c.as_i64()),
                constraint_type,
                default: cell(row, default_idx).and_then(|c| c.to_text()),
                ordinal_position,
            });
        }

        records.sort_by_key(|r| r.ordinal_position);
        records
    }

    fn add_constraint(&mut self, constraint: Option<String>) {
        let Some(constraint) = constraint else {
            return;
        };
        match &mut self.constraint_type {
            None => self.constraint_type = Some(constraint),
            Some(existing) => {
                if !existing.split(", ").any(|c| c == constraint) {
                    existing.push_str(", ");
                    existing.push_str(&constraint);
                }
            }
        }
    }
}

fn parse_nullable(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_uppercase().as_str(),
        "YES" | "Y" | "TRUE" | "1"
    )
}

/// Extracted schema: table name to columns in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub dialect: Dialect,
    pub tables: BTreeMap<String, Vec<ColumnRecord>>,
}

impl SchemaDocument {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: BTreeMap::new(),
        }
    }

    /// Add or replace a table, ordering its columns by position.
    pub fn insert(&mut self, table: impl Into<String>, mut columns: Vec<ColumnRecord>) {
        columns.sort_by_key(|c| c.ordinal_position);
        self.tables.insert(table.into(), columns);
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Total number of columns across all tables.
    pub fn column_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}
