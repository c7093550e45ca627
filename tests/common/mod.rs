//! Shared fixtures for integration tests: offline embedder and model doubles,
//! a recording index wrapper, and a small SQLite shop database.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use txt2sql::embed::{EmbedResult, Embedder, EmbeddingMode};
use txt2sql::index::{IndexResult, IndexStats, LocalIndex, ScoredChunk, VectorIndex, VectorRecord};
use txt2sql::llm::{ChatMessage, CompletionModel, ModelError, ModelResult};
use txt2sql::schema::{ColumnRecord, Namespace};

pub const DIMENSIONS: usize = 64;

/// Hashes each word into one of [`DIMENSIONS`] buckets.
pub struct WordEmbedder {
    calls: AtomicUsize,
}

impl WordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn embed_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
        v[bucket % DIMENSIONS] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for WordEmbedder {
    async fn embed(&self, texts: &[String], _mode: EmbeddingMode) -> EmbedResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| embed_words(t)).collect())
    }

    fn model_name(&self) -> &str {
        "words"
    }
}

/// Replays scripted completions in order, recording each user prompt.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelResult<String>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> ModelResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(last) = messages.last() {
            self.prompts.lock().unwrap().push(last.content.clone());
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("script exhausted".into())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Index operation seen by [`RecordingIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOp {
    Delete(String),
    Upsert(String, usize),
}

/// Wraps a [`LocalIndex`], logging writes and optionally slowing upserts.
pub struct RecordingIndex {
    inner: LocalIndex,
    ops: Mutex<Vec<IndexOp>>,
    upsert_delay: Duration,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::with_upsert_delay(Duration::ZERO)
    }

    pub fn with_upsert_delay(upsert_delay: Duration) -> Self {
        Self {
            inner: LocalIndex::open_in_memory().unwrap(),
            ops: Mutex::new(Vec::new()),
            upsert_delay,
        }
    }

    pub fn ops(&self) -> Vec<IndexOp> {
        self.ops.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn describe_stats(&self) -> IndexResult<IndexStats> {
        self.inner.describe_stats().await
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> IndexResult<()> {
        self.ops
            .lock()
            .unwrap()
            .push(IndexOp::Delete(namespace.to_string()));
        self.inner.delete_namespace(namespace).await
    }

    async fn upsert(&self, namespace: &Namespace, records: Vec<VectorRecord>) -> IndexResult<usize> {
        if !self.upsert_delay.is_zero() {
            tokio::time::sleep(self.upsert_delay).await;
        }
        self.ops
            .lock()
            .unwrap()
            .push(IndexOp::Upsert(namespace.to_string(), records.len()));
        self.inner.upsert(namespace, records).await
    }

    async fn query(
        &self,
        namespace: &Namespace,
        vector: &[f32],
        top_k: usize,
    ) -> IndexResult<Vec<ScoredChunk>> {
        self.inner.query(namespace, vector, top_k).await
    }
}

pub fn column(table: &str, name: &str, data_type: &str, position: i64) -> ColumnRecord {
    ColumnRecord {
        table: table.into(),
        column: name.into(),
        data_type: data_type.into(),
        nullable: position != 1,
        length: None,
        precision: None,
        scale: None,
        constraint_type: (position == 1).then(|| "PRIMARY KEY".to_string()),
        default: None,
        ordinal_position: position,
    }
}

/// Create `shop.db` in `dir` with `customers` and `orders`.
pub fn shop_db(dir: &Path) -> PathBuf {
    let path = dir.join("shop.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE customers (
            customer_id INTEGER PRIMARY KEY,
            name VARCHAR(100) NOT NULL,
            city TEXT DEFAULT 'unknown'
        );
        CREATE TABLE orders (
            order_id INTEGER PRIMARY KEY,
            customer_id INTEGER NOT NULL REFERENCES customers(customer_id),
            amount NUMERIC,
            placed_at TEXT
        );
        INSERT INTO customers VALUES (1, 'Ada', 'London'), (2, 'Grace', NULL);
        INSERT INTO orders VALUES (10, 1, 25.5, '2024-01-02'), (11, 1, 4.5, '2024-02-03'), (12, 2, 99.5, NULL);",
    )
    .unwrap();
    path
}
