//! Syntax validation for generated SQL.
//!
//! Uses sqlparser-rs to parse a statement with the parser dialect of the
//! target engine and classifies it. Only a single statement of a recognized
//! kind is accepted.

use sqlparser::ast::Statement;
use sqlparser::parser::Parser;

use super::dialect::{CatalogDialect, Dialect};

/// Kind of a validated statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Ddl,
}

impl StatementKind {
    fn classify(statement: &Statement) -> Option<Self> {
        match statement {
            Statement::Query { .. } => Some(StatementKind::Select),
            Statement::Insert { .. } => Some(StatementKind::Insert),
            Statement::Update { .. } => Some(StatementKind::Update),
            Statement::Delete { .. } => Some(StatementKind::Delete),
            Statement::Merge { .. } => Some(StatementKind::Merge),
            Statement::CreateTable { .. }
            | Statement::CreateView { .. }
            | Statement::CreateIndex { .. }
            | Statement::AlterTable { .. }
            | Statement::Drop { .. }
            | Statement::Truncate { .. } => Some(StatementKind::Ddl),
            _ => None,
        }
    }
}

/// Validates that a SQL string is one well-formed statement for the given dialect.
///
/// Returns a human-readable reason on failure, suitable for feeding back to
/// the model as a correction.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<StatementKind, String> {
    if sql.trim().is_empty() {
        return Err("the SQL statement is empty".to_string());
    }

    let parser_dialect = dialect.parser_dialect();
    let statements = Parser::parse_sql(&*parser_dialect, sql)
        .map_err(|e| format!("the SQL is not valid {} syntax: {}", dialect, e))?;

    match statements.as_slice() {
        [] => Err("the SQL statement is empty".to_string()),
        [statement] => StatementKind::classify(statement)
            .ok_or_else(|| "the SQL statement type is not recognized".to_string()),
        _ => Err(format!(
            "expected a single SQL statement, found {}",
            statements.len()
        )),
    }
}
