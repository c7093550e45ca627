//! Operations exposed to the route layer.
//!
//! [`Txt2SqlService`] wires introspection, indexing and generation together.
//! [`SchemaService`] is the database-only subset and needs no external
//! service credentials. Every operation returns a typed result;
//! [`ApiResponse`] turns one into the `{success, ..., error}` payload callers
//! receive.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::cache::{EngineCache, NamespaceLocks};
use crate::config::{expand_env_vars, ConnectionSpec, Settings};
use crate::embed::{CohereEmbedder, Embedder};
use crate::engine::{Generated, GenerationResult, OutputKind, QueryGenerationEngine};
use crate::error::{ErrorBody, Txt2SqlError, Txt2SqlResult};
use crate::index::{open_index, InsertReport, VectorIndex, VectorIndexManager};
use crate::introspect::{introspector, SchemaIntrospector, SqlParam, TabularResult};
use crate::llm::prompts::DEFAULT_RECOMMENDATIONS_REQUEST;
use crate::llm::{CompletionModel, GroqModel};
use crate::schema::{ColumnRecord, Namespace, NamespaceKeyer, SchemaDocument, SchemaDocumentBuilder};

/// Result of indexing one or more tables.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedSchema {
    pub document: SchemaDocument,
    pub report: InsertReport,
}

/// Database-side operations. Needs no index, embedding or model client.
#[derive(Debug, Clone, Copy)]
pub struct SchemaService {
    timeout: Duration,
}

impl SchemaService {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn introspector(&self, spec: &ConnectionSpec) -> Txt2SqlResult<Box<dyn SchemaIntrospector>> {
        Ok(introspector(spec, self.timeout)?)
    }

    /// Column metadata for one table. An unknown table yields an empty
    /// document entry.
    pub async fn extract_schema(
        &self,
        spec: &ConnectionSpec,
        table: &str,
    ) -> Txt2SqlResult<SchemaDocument> {
        let table = required("table", table)?;
        let db = self.introspector(spec)?;
        let columns = db.extract_columns(table).await?;

        let mut document = SchemaDocument::new(spec.dialect);
        document.insert(table, columns);
        info!(dialect = %spec.dialect, table, columns = document.column_count(), "extracted schema");
        Ok(document)
    }

    /// Several tables, extracted concurrently.
    pub async fn extract_tables(
        &self,
        spec: &ConnectionSpec,
        tables: &[String],
    ) -> Txt2SqlResult<SchemaDocument> {
        let db = self.introspector(spec)?;
        Ok(db.extract_schema(tables).await?)
    }

    /// Base tables in the connection's schema.
    pub async fn list_tables(&self, spec: &ConnectionSpec) -> Txt2SqlResult<Vec<String>> {
        let db = self.introspector(spec)?;
        Ok(db.list_tables().await?)
    }

    /// Run caller SQL against the database.
    pub async fn execute_query(
        &self,
        spec: &ConnectionSpec,
        sql: &str,
        params: &[SqlParam],
    ) -> Txt2SqlResult<TabularResult> {
        let sql = required("sql", sql)?;
        let db = self.introspector(spec)?;
        let result = db.run_query(sql, params).await?;
        info!(dialect = %spec.dialect, rows = result.len(), "executed query");
        Ok(result)
    }
}

/// Facade over the whole pipeline.
pub struct Txt2SqlService {
    schema: SchemaService,
    manager: VectorIndexManager,
    engine: QueryGenerationEngine,
    max_retries: u32,
}

impl Txt2SqlService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        settings: &Settings,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
    ) -> Self {
        let engines = Arc::new(EngineCache::new());
        let locks = Arc::new(NamespaceLocks::new());

        let manager = VectorIndexManager::new(
            Arc::clone(&index),
            Arc::clone(&embedder),
            Arc::clone(&engines),
            Arc::clone(&locks),
        )
        .with_builder(SchemaDocumentBuilder::from_settings(&settings.chunking))
        .with_soft_cap(settings.index.namespace_soft_cap, settings.index.eviction);

        let engine = QueryGenerationEngine::new(index, embedder, model, engines, locks)
            .with_top_k(settings.retrieval.top_k);

        Self {
            schema: SchemaService::new(settings.timeouts.database()),
            manager,
            engine,
            max_retries: settings.generation.max_retries,
        }
    }

    /// Build the configured index, embedding and model clients.
    ///
    /// Secrets referenced as `${VAR}` are expanded here.
    pub fn from_settings(settings: &Settings) -> Txt2SqlResult<Self> {
        let mut resolved = settings.clone();
        resolved.index.host = expand_env_vars(&settings.index.host)?;
        resolved.index.api_key = expand_env_vars(&settings.index.api_key)?;
        resolved.embedding.api_key = expand_env_vars(&settings.embedding.api_key)?;
        resolved.llm.api_key = expand_env_vars(&settings.llm.api_key)?;

        let index = open_index(&resolved)?;
        let embedder: Arc<dyn Embedder> = Arc::new(CohereEmbedder::new(
            &resolved.embedding,
            resolved.timeouts.embedding(),
        )?);
        let model: Arc<dyn CompletionModel> =
            Arc::new(GroqModel::new(&resolved.llm, resolved.timeouts.llm())?);

        Ok(Self::new(&resolved, index, embedder, model))
    }

    pub fn manager(&self) -> &VectorIndexManager {
        &self.manager
    }

    pub fn engine(&self) -> &QueryGenerationEngine {
        &self.engine
    }

    fn keyer(&self, spec: &ConnectionSpec) -> Txt2SqlResult<NamespaceKeyer> {
        Ok(NamespaceKeyer::new(spec.dialect, spec.schema()?))
    }

    /// Namespace a single table of `spec` is indexed under.
    pub fn table_namespace(&self, spec: &ConnectionSpec, table: &str) -> Txt2SqlResult<Namespace> {
        Ok(self.keyer(spec)?.table(table))
    }

    pub fn schema(&self) -> &SchemaService {
        &self.schema
    }

    pub async fn extract_schema(
        &self,
        spec: &ConnectionSpec,
        table: &str,
    ) -> Txt2SqlResult<SchemaDocument> {
        self.schema.extract_schema(spec, table).await
    }

    pub async fn list_tables(&self, spec: &ConnectionSpec) -> Txt2SqlResult<Vec<String>> {
        self.schema.list_tables(spec).await
    }

    pub async fn execute_query(
        &self,
        spec: &ConnectionSpec,
        sql: &str,
        params: &[SqlParam],
    ) -> Txt2SqlResult<TabularResult> {
        self.schema.execute_query(spec, sql, params).await
    }

    /// Extract one table and replace its namespace with it.
    pub async fn index_schema(
        &self,
        spec: &ConnectionSpec,
        table: &str,
    ) -> Txt2SqlResult<IndexedSchema> {
        let document = self.extract_schema(spec, table).await?;
        let namespace = self.table_namespace(spec, table.trim())?;
        let report = self.manager.insert(&document, &namespace).await?;
        Ok(IndexedSchema { document, report })
    }

    /// Extract several tables concurrently and index them together under
    /// the hashed multi-table namespace.
    pub async fn create_multitable_context(
        &self,
        spec: &ConnectionSpec,
        tables: &[String],
    ) -> Txt2SqlResult<IndexedSchema> {
        let mut names: Vec<String> = tables
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        names.sort();
        names.dedup();

        let namespace = self
            .keyer(spec)?
            .tables(&names)
            .ok_or_else(|| Txt2SqlError::InvalidInput("at least one table is required".to_string()))?;

        let document = self.schema.extract_tables(spec, &names).await?;
        let report = self.manager.insert(&document, &namespace).await?;
        Ok(IndexedSchema { document, report })
    }

    /// Natural language to validated SQL.
    pub async fn generate_sql(
        &self,
        question: &str,
        namespace: &Namespace,
        max_retries: Option<u32>,
    ) -> Txt2SqlResult<Generated> {
        self.engine
            .generate(
                question,
                namespace,
                OutputKind::Sql,
                max_retries.unwrap_or(self.max_retries),
            )
            .await
    }

    /// Insight suggestions for an indexed namespace.
    pub async fn recommendations(
        &self,
        namespace: &Namespace,
        focus: Option<&str>,
    ) -> Txt2SqlResult<Generated> {
        let request = focus
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_RECOMMENDATIONS_REQUEST);
        self.engine
            .generate(request, namespace, OutputKind::Recommendations, self.max_retries)
            .await
    }
}

fn required<'a>(field: &str, value: &'a str) -> Txt2SqlResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Txt2SqlError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(value)
}

/// Response payload for the route layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<BTreeMap<String, Vec<ColumnRecord>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<Namespace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tables: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Map<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ApiResponse {
    fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(err: &Txt2SqlError) -> Self {
        error!(category = err.category(), error = %err, "request failed");
        Self {
            success: false,
            error: Some(ErrorBody::from(err)),
            ..Self::default()
        }
    }

    pub fn schema(document: SchemaDocument) -> Self {
        Self {
            schema: Some(document.tables),
            ..Self::ok()
        }
    }

    pub fn tables(names: Vec<String>) -> Self {
        Self {
            table_names: Some(names),
            ..Self::ok()
        }
    }

    pub fn indexed(indexed: IndexedSchema) -> Self {
        Self {
            namespace_id: Some(indexed.report.namespace),
            chunks: Some(indexed.report.chunks),
            capacity_warning: indexed.report.capacity_warning,
            ..Self::ok()
        }
    }

    pub fn generated(generated: Generated) -> Self {
        match generated.result {
            GenerationResult::Sql {
                sql,
                explanation,
                source_tables,
            } => Self {
                sql: Some(sql),
                explanation: Some(explanation),
                source_tables: Some(source_tables),
                ..Self::ok()
            },
            GenerationResult::Recommendations { recommendations } => Self {
                recommendations: Some(recommendations),
                ..Self::ok()
            },
        }
    }

    pub fn rows(result: TabularResult) -> Self {
        Self {
            data: Some(result.to_records()),
            columns: Some(result.columns().to_vec()),
            ..Self::ok()
        }
    }

    /// Map an operation result through `on_success`, or into a failure.
    pub fn from_result<T>(result: Txt2SqlResult<T>, on_success: impl FnOnce(T) -> Self) -> Self {
        match result {
            Ok(value) => on_success(value),
            Err(err) => Self::failure(&err),
        }
    }
}
