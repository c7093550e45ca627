//! SQLite-backed vector index.
//!
//! Vectors are stored as little-endian `f32` blobs and searched by brute
//! force cosine similarity, which is plenty for schema-sized namespaces.
//! The database is versioned; a version mismatch clears stored vectors.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{IndexError, IndexResult, IndexStats, ScoredChunk, VectorIndex, VectorRecord};
use crate::schema::Namespace;

/// Current storage version. Bump this when the table layout changes.
const INDEX_VERSION: i32 = 1;

/// Local vector index in a single SQLite file.
pub struct LocalIndex {
    conn: Mutex<Connection>,
}

impl LocalIndex {
    /// Open or create the index at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let index = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        index.init()?;
        Ok(index)
    }

    /// Open an in-memory index (for testing).
    pub fn open_in_memory() -> IndexResult<Self> {
        let index = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        index.init()?;
        Ok(index)
    }

    fn conn(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| IndexError::Config("local index lock poisoned".to_string()))
    }

    fn init(&self) -> IndexResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS vectors (
                namespace TEXT NOT NULL,
                id TEXT NOT NULL,
                text TEXT NOT NULL,
                source_table TEXT,
                embedding BLOB NOT NULL,
                PRIMARY KEY (namespace, id)
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        let stored_version: Option<i32> = conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
                let s: String = row.get(0)?;
                Ok(s.parse().unwrap_or(0))
            })
            .optional()?;

        if stored_version != Some(INDEX_VERSION) {
            if stored_version.is_some() {
                conn.execute("DELETE FROM vectors", [])?;
            }
            conn.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?)",
                params![INDEX_VERSION.to_string()],
            )?;
        }

        Ok(())
    }
}

fn encode(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity; zero when either vector has no magnitude.
pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorIndex for LocalIndex {
    async fn describe_stats(&self) -> IndexResult<IndexStats> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT namespace, COUNT(*) FROM vectors GROUP BY namespace")?;
        let namespaces = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<_, _>>()?;
        Ok(IndexStats { namespaces })
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> IndexResult<()> {
        self.conn()?.execute(
            "DELETE FROM vectors WHERE namespace = ?",
            params![namespace.as_str()],
        )?;
        Ok(())
    }

    async fn upsert(
        &self,
        namespace: &Namespace,
        records: Vec<VectorRecord>,
    ) -> IndexResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO vectors (namespace, id, text, source_table, embedding)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for record in &records {
                stmt.execute(params![
                    namespace.as_str(),
                    record.id,
                    record.metadata.text,
                    record.metadata.source_table,
                    encode(&record.values),
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    async fn query(
        &self,
        namespace: &Namespace,
        vector: &[f32],
        top_k: usize,
    ) -> IndexResult<Vec<ScoredChunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, text, source_table, embedding FROM vectors WHERE namespace = ?",
        )?;
        let rows = stmt.query_map(params![namespace.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, text, source_table, embedding) = row?;
            let stored = decode(&embedding);
            if stored.len() != vector.len() {
                return Err(IndexError::InvalidResponse(format!(
                    "vector {} has dimension {}, query has {}",
                    id,
                    stored.len(),
                    vector.len()
                )));
            }
            scored.push(ScoredChunk {
                id,
                score: cosine(&stored, vector),
                text,
                source_table,
            });
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        scored.truncate(top_k);
        Ok(scored)
    }
}
