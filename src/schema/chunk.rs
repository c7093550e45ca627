//! Splitting schema documents into retrievable chunks.
//!
//! Multi-table documents produce one chunk per table, prefixed with the table
//! name so each chunk stands on its own in retrieval. A single-table document
//! is serialized once and cut into fixed-size word windows that overlap, so
//! a column definition straddling a boundary appears whole in one of them.

use std::io;

use serde::Serialize;

use super::{Namespace, SchemaDocument};
use crate::config::ChunkingSettings;

/// One span of schema text bound for the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexChunk {
    pub text: String,
    pub namespace: Namespace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
}

/// Builds index chunks from a schema document.
#[derive(Debug, Clone, Copy)]
pub struct SchemaDocumentBuilder {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for SchemaDocumentBuilder {
    fn default() -> Self {
        Self::from_settings(&ChunkingSettings::default())
    }
}

impl SchemaDocumentBuilder {
    /// Create a builder. The overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    /// Chunks representing `document` under `namespace`.
    pub fn build(&self, document: &SchemaDocument, namespace: &Namespace) -> Vec<IndexChunk> {
        if document.len() > 1 {
            return document
                .tables
                .iter()
                .map(|(table, columns)| IndexChunk {
                    text: format!("Table '{}': {}", table, to_json(columns)),
                    namespace: namespace.clone(),
                    source_table: Some(table.clone()),
                })
                .collect();
        }

        let source_table = document.table_names().next().map(str::to_string);
        self.split(&to_json(&document.tables))
            .into_iter()
            .map(|text| IndexChunk {
                text,
                namespace: namespace.clone(),
                source_table: source_table.clone(),
            })
            .collect()
    }

    /// Cut `text` into overlapping word windows.
    ///
    /// Text that fits in one window is returned unchanged.
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        if words.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

/// Compact JSON with a space after each `,` and `:`, so word windows have
/// boundaries to cut on.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    // Serializing plain maps and records cannot fail
    if value.serialize(&mut ser).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
