//! Deterministic vector index namespaces.
//!
//! A namespace names one indexed schema snapshot:
//!
//! ```text
//! single table:    {dialect}_{schema}_{table}
//! several tables:  {dialect}_{schema}__{first 16 hex chars of sha256(sorted names joined by ",")}
//! ```
//!
//! The multi-table form ignores input order and duplicates, so the same set
//! of tables always maps to the same namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::compute_hash;
use crate::sql::dialect::Dialect;

/// Hex characters of the digest kept in a multi-table namespace.
const DIGEST_PREFIX_LEN: usize = 16;

/// Opaque key partitioning the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Wrap an existing namespace string, e.g. one returned to a caller earlier.
    pub fn new(raw: impl Into<String>) -> Self {
        Namespace(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dialect encoded in the namespace prefix, if recognizable.
    pub fn dialect(&self) -> Option<Dialect> {
        self.0.split('_').next()?.parse().ok()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives namespaces for tables in one dialect and schema.
#[derive(Debug, Clone)]
pub struct NamespaceKeyer {
    dialect: Dialect,
    schema: String,
}

impl NamespaceKeyer {
    pub fn new(dialect: Dialect, schema: impl Into<String>) -> Self {
        Self {
            dialect,
            schema: schema.into(),
        }
    }

    /// Namespace for a single table.
    pub fn table(&self, table: &str) -> Namespace {
        Namespace(format!("{}_{}_{}", self.dialect, self.schema, table))
    }

    /// Namespace for a set of tables.
    ///
    /// Returns `None` for an empty set. A set with one distinct table is keyed
    /// like a single table.
    pub fn tables<S: AsRef<str>>(&self, tables: &[S]) -> Option<Namespace> {
        let mut names: Vec<&str> = tables.iter().map(|t| t.as_ref()).collect();
        names.sort_unstable();
        names.dedup();

        match names.as_slice() {
            [] => None,
            [single] => Some(self.table(single)),
            _ => {
                let digest = compute_hash(&names.join(","));
                Some(Namespace(format!(
                    "{}_{}__{}",
                    self.dialect,
                    self.schema,
                    &digest[..DIGEST_PREFIX_LEN]
                )))
            }
        }
    }
}
