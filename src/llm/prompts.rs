//! Prompt text for SQL generation and recommendations.

use std::fmt::Write;

use crate::index::ScoredChunk;
use crate::sql::dialect::Dialect;

/// System prompt for natural language to SQL.
pub const SQL_SYSTEM_PROMPT: &str = r#"You translate questions about a relational database into SQL.

You receive schema context retrieved for the question, the database type and the question itself. Use only tables and columns present in the context.

Answer with exactly one JSON object and nothing else:
{
  "sql": "<one SQL statement valid for the database type>",
  "explanation": "<one sentence describing what the statement does>",
  "source_tables": ["<table>", "..."]
}

Example
Context: Table 'customers': [{"column_name": "customer_id", "data_type": "integer"}, {"column_name": "city", "data_type": "varchar"}]
Database type: postgresql
Question: Which customers live in Lisbon?
Answer: {"sql": "SELECT * FROM customers WHERE city = 'Lisbon';", "explanation": "Returns every customer whose city is Lisbon.", "source_tables": ["customers"]}

Example
Context: Table 'customers': [{"column_name": "customer_id", "data_type": "int"}, {"column_name": "name", "data_type": "varchar"}]
Table 'orders': [{"column_name": "order_id", "data_type": "int"}, {"column_name": "customer_id", "data_type": "int"}, {"column_name": "amount", "data_type": "decimal"}]
Database type: mysql
Question: Total order amount per customer
Answer: {"sql": "SELECT c.name, SUM(o.amount) AS total_amount FROM customers c JOIN orders o ON o.customer_id = c.customer_id GROUP BY c.name;", "explanation": "Sums order amounts for each customer by joining orders to customers.", "source_tables": ["customers", "orders"]}"#;

/// System prompt for insight recommendations.
pub const RECOMMENDATIONS_SYSTEM_PROMPT: &str = r#"You suggest analyses that can be answered from a relational database.

You receive schema context, the database type and a request. Propose at least ten specific, actionable questions or insights that the schema can answer, such as trends, rankings, aggregates or distributions. Phrase each as a short natural language sentence.

Answer with exactly one JSON object and nothing else:
{"recommendations": ["<insight>", "..."]}

Example
Context: Table 'employees': [{"column_name": "emp_id"}, {"column_name": "department"}, {"column_name": "salary"}]
Answer: {"recommendations": ["Average salary per department.", "Ten highest paid employees.", "Headcount in each department."]}"#;

/// Request used when the caller asks for recommendations without a focus.
pub const DEFAULT_RECOMMENDATIONS_REQUEST: &str =
    "Recommend insights that can be derived from this data.";

/// User message combining retrieved context, dialect and question.
pub fn user_prompt(context: &[ScoredChunk], dialect: Option<Dialect>, question: &str) -> String {
    let mut prompt = String::from("Context:\n");
    if context.is_empty() {
        prompt.push_str("(no schema context was found)\n");
    }
    for chunk in context {
        prompt.push_str(&chunk.text);
        prompt.push('\n');
    }
    if let Some(dialect) = dialect {
        let _ = writeln!(prompt, "Database type: {}", dialect);
    }
    let _ = write!(prompt, "Question: {}", question);
    prompt
}

/// Question amended with the reason the previous answer was rejected.
pub fn with_correction(question: &str, error: &str) -> String {
    format!(
        "{}\n\nYour previous answer was rejected: {}. Return a corrected JSON object.",
        question, error
    )
}
