//! Retrieval-augmented query generation.
//!
//! Each namespace moves between two states:
//!
//! ```text
//!   uncached ── first generate ──▶ cached ── insert / evict ──▶ uncached
//! ```
//!
//! A [`CachedEngine`] binds a top-k retriever over one namespace to the
//! completion model. [`QueryGenerationEngine::generate`] runs the
//! self-correcting loop: retrieve, complete, clean, validate, and on a
//! validation failure re-prompt with the reason appended. Infrastructure
//! failures end the loop immediately.

mod result;
mod validate;

pub use result::{GenerationResult, Generated, OutputKind};
pub use validate::validate_output;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{EngineCache, NamespaceLocks};
use crate::embed::{Embedder, EmbeddingMode};
use crate::error::{Txt2SqlError, Txt2SqlResult};
use crate::index::{ScoredChunk, VectorIndex};
use crate::llm::prompts::{self, RECOMMENDATIONS_SYSTEM_PROMPT, SQL_SYSTEM_PROMPT};
use crate::llm::{clean_json, ChatMessage, CompletionModel};
use crate::schema::Namespace;
use crate::sql::Dialect;

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Default number of completion attempts per question.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Similarity search over one namespace.
pub struct Retriever {
    namespace: Namespace,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        namespace: Namespace,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
    ) -> Self {
        Self {
            namespace,
            index,
            embedder,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The `top_k` chunks closest to `question`, embedded in query mode.
    pub async fn retrieve(&self, question: &str) -> Txt2SqlResult<Vec<ScoredChunk>> {
        let vector = self
            .embedder
            .embed_one(question, EmbeddingMode::Query)
            .await?;
        Ok(self.index.query(&self.namespace, &vector, self.top_k).await?)
    }
}

/// Retriever and model bound to one namespace.
pub struct CachedEngine {
    namespace: Namespace,
    build_id: u64,
    retriever: Retriever,
    model: Arc<dyn CompletionModel>,
}

impl CachedEngine {
    pub fn new(
        namespace: Namespace,
        build_id: u64,
        retriever: Retriever,
        model: Arc<dyn CompletionModel>,
    ) -> Self {
        Self {
            namespace,
            build_id,
            retriever,
            model,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Identifies this build; a rebuilt engine always has a new id.
    pub fn build_id(&self) -> u64 {
        self.build_id
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn complete(&self, system: &str, user: String) -> Txt2SqlResult<String> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        Ok(self.model.complete(&messages).await?)
    }
}

/// Generates validated SQL or recommendations for indexed namespaces.
pub struct QueryGenerationEngine {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn CompletionModel>,
    engines: Arc<EngineCache>,
    locks: Arc<NamespaceLocks>,
    top_k: usize,
}

impl QueryGenerationEngine {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
        engines: Arc<EngineCache>,
        locks: Arc<NamespaceLocks>,
    ) -> Self {
        Self {
            index,
            embedder,
            model,
            engines,
            locks,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    fn build_engine(&self, namespace: &Namespace, build_id: u64) -> CachedEngine {
        let retriever = Retriever::new(
            namespace.clone(),
            Arc::clone(&self.index),
            Arc::clone(&self.embedder),
            self.top_k,
        );
        CachedEngine::new(namespace.clone(), build_id, retriever, Arc::clone(&self.model))
    }

    /// Cached engine for `namespace`, building it on first use.
    pub fn engine_for(&self, namespace: &Namespace) -> Arc<CachedEngine> {
        let (engine, built) = self
            .engines
            .get_or_build(namespace, |id| self.build_engine(namespace, id));
        if built {
            info!(%namespace, build_id = engine.build_id(), "built query engine");
        } else {
            debug!(%namespace, build_id = engine.build_id(), "using cached query engine");
        }
        engine
    }

    /// Answer `question` against `namespace`.
    ///
    /// Runs at most `max_retries` completion attempts (at least one). Each
    /// rejected answer is fed back as a correction; exhausting the attempts
    /// yields [`Txt2SqlError::GenerationExhausted`]. Any other failure is
    /// returned as soon as it occurs.
    pub async fn generate(
        &self,
        question: &str,
        namespace: &Namespace,
        expected: OutputKind,
        max_retries: u32,
    ) -> Txt2SqlResult<Generated> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Txt2SqlError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        let attempts = max_retries.max(1);
        let mut prompt = question.to_string();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self
                .attempt(question, &prompt, namespace, expected, attempt)
                .await
            {
                Ok(generated) => {
                    info!(%namespace, attempt, kind = %expected, "generation succeeded");
                    return Ok(generated);
                }
                Err(err) if err.is_retryable_validation() => {
                    warn!(%namespace, attempt, error = %err, "rejected model answer");
                    last_error = match err {
                        Txt2SqlError::Validation(reason) => reason,
                        other => other.to_string(),
                    };
                    prompt = prompts::with_correction(question, &last_error);
                }
                Err(err) => {
                    warn!(%namespace, attempt, error = %err, "generation aborted");
                    return Err(err);
                }
            }
        }

        Err(Txt2SqlError::GenerationExhausted {
            attempts,
            last_error,
        })
    }

    async fn attempt(
        &self,
        question: &str,
        prompt: &str,
        namespace: &Namespace,
        expected: OutputKind,
        attempt: u32,
    ) -> Txt2SqlResult<Generated> {
        let (engine, context) = {
            // Lookup and retrieval must not interleave with a re-index
            let _guard = self.locks.read(namespace).await;
            let engine = self.engine_for(namespace);
            let context = engine.retriever().retrieve(question).await?;
            (engine, context)
        };
        if context.is_empty() {
            // Unindexed namespace
            self.locks.prune(namespace);
        }
        debug!(%namespace, attempt, chunks = context.len(), "retrieved context");

        let dialect = namespace.dialect();
        let system = match expected {
            OutputKind::Sql => SQL_SYSTEM_PROMPT,
            OutputKind::Recommendations => RECOMMENDATIONS_SYSTEM_PROMPT,
        };
        let raw = engine
            .complete(system, prompts::user_prompt(&context, dialect, prompt))
            .await?;

        let cleaned = clean_json(&raw);
        let result = validate_output(
            &cleaned,
            expected,
            dialect.unwrap_or(Dialect::Postgresql),
        )
        .map_err(Txt2SqlError::Validation)?;

        Ok(Generated {
            raw_json: cleaned,
            result,
            attempts: attempt,
        })
    }
}
