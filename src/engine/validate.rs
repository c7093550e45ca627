//! Structural validation of model answers.
//!
//! Errors are plain sentences; they are fed back to the model verbatim as
//! the correction for the next attempt.

use serde_json::Value;

use super::result::{GenerationResult, OutputKind};
use crate::sql::{validate_sql, Dialect};

/// Validate cleaned model output against the expected key.
pub fn validate_output(
    cleaned: &str,
    expected: OutputKind,
    dialect: Dialect,
) -> Result<GenerationResult, String> {
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| format!("the response is not valid JSON ({})", e))?;
    let Value::Object(object) = value else {
        return Err("the response must be a single JSON object".to_string());
    };

    let key = expected.key();
    let Some(answer) = object.get(key) else {
        return Err(format!("the response has no '{}' key", key));
    };

    match expected {
        OutputKind::Sql => {
            let sql = match answer {
                Value::String(s) => s.trim(),
                Value::Null => return Err("'sql' is null; it must be a SQL string".to_string()),
                _ => return Err("'sql' must be a string".to_string()),
            };
            validate_sql(sql, dialect)?;

            Ok(GenerationResult::Sql {
                sql: sql.to_string(),
                explanation: object
                    .get("explanation")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                source_tables: object
                    .get("source_tables")
                    .and_then(Value::as_array)
                    .map(|tables| {
                        tables
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
        }
        OutputKind::Recommendations => {
            let Value::Array(items) = answer else {
                return Err("'recommendations' must be an array of strings".to_string());
            };
            let recommendations = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| "'recommendations' must contain only strings".to_string())?;
            Ok(GenerationResult::Recommendations { recommendations })
        }
    }
}
