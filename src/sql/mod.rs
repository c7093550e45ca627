//! SQL dialect module.
//!
//! - [`dialect`] - Catalog dialects (placeholders, catalog queries, schema defaults)
//! - [`validate`] - Syntax validation of generated SQL

pub mod dialect;
pub mod validate;

pub use dialect::{CatalogDialect, Dialect, UnsupportedDialect};
pub use validate::{validate_sql, StatementKind};
