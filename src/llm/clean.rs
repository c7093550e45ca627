//! Reduce raw completion text to the JSON object it carries.

use std::sync::LazyLock;

use regex::Regex;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").unwrap());

/// Strip markdown fences and surrounding prose.
///
/// Returns the text from the first `{` to the last `}` when both exist,
/// otherwise the trimmed (unfenced) input so the parser reports the error.
pub fn clean_json(raw: &str) -> String {
    let unfenced = FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim();

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => unfenced[start..=end].to_string(),
        _ => unfenced.to_string(),
    }
}
