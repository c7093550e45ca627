//! Shared helper functions for catalog dialect implementations.

// =============================================================================
// Placeholders
// =============================================================================

/// `$n` placeholders.
/// Used by: PostgreSQL
pub fn placeholder_dollar(index: usize) -> String {
    format!("${}", index)
}

/// Anonymous `?` placeholders, bound strictly by position.
/// Used by: MySQL
pub fn placeholder_question(_index: usize) -> String {
    "?".to_string()
}

/// `:n` placeholders.
/// Used by: Oracle
pub fn placeholder_colon(index: usize) -> String {
    format!(":{}", index)
}

/// `?n` placeholders, which may be repeated within one statement.
/// Used by: SQLite
pub fn placeholder_numbered_question(index: usize) -> String {
    format!("?{}", index)
}

// =============================================================================
// Identifiers
// =============================================================================

/// Fold an identifier to upper case unless it is already quoted.
/// Used by: Oracle
pub fn fold_upper(ident: &str) -> String {
    match strip_quotes(ident) {
        Some(inner) => inner.to_string(),
        None => ident.to_uppercase(),
    }
}

/// Strip surrounding double quotes, if present.
pub fn strip_quotes(ident: &str) -> Option<&str> {
    ident
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
}

/// Map a single-letter Oracle constraint code to its name.
pub const ORACLE_CONSTRAINT_CASE: &str = "CASE k.constraint_type \
     WHEN 'P' THEN 'PRIMARY KEY' \
     WHEN 'U' THEN 'UNIQUE' \
     WHEN 'R' THEN 'FOREIGN KEY' END";
