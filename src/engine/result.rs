//! Typed generation output.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Txt2SqlError;

/// Which JSON key the caller expects the model to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Sql,
    Recommendations,
}

impl OutputKind {
    /// The expected output key.
    pub fn key(&self) -> &'static str {
        match self {
            OutputKind::Sql => "sql",
            OutputKind::Recommendations => "recommendations",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for OutputKind {
    type Err = Txt2SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" => Ok(OutputKind::Sql),
            "recommendations" => Ok(OutputKind::Recommendations),
            other => Err(Txt2SqlError::InvalidInput(format!(
                "unknown expected output key '{}'; expected 'sql' or 'recommendations'",
                other
            ))),
        }
    }
}

/// Validated model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationResult {
    Sql {
        sql: String,
        #[serde(default)]
        explanation: String,
        #[serde(default)]
        source_tables: Vec<String>,
    },
    Recommendations {
        recommendations: Vec<String>,
    },
}

impl GenerationResult {
    pub fn kind(&self) -> OutputKind {
        match self {
            GenerationResult::Sql { .. } => OutputKind::Sql,
            GenerationResult::Recommendations { .. } => OutputKind::Recommendations,
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            GenerationResult::Sql { sql, .. } => Some(sql),
            GenerationResult::Recommendations { .. } => None,
        }
    }
}

/// A successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Generated {
    /// Cleaned JSON text as returned by the model.
    pub raw_json: String,
    pub result: GenerationResult,
    /// Completion calls spent, including the successful one.
    pub attempts: u32,
}
