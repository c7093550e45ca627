//! TOML-based configuration for txt2sql.
//!
//! Supports a config file (txt2sql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [connections.shop]
//! dialect = "mysql"
//! host = "db.internal"
//! username = "reader"
//! password = "${SHOP_DB_PASSWORD}"
//! database = "shop"
//!
//! [index]
//! backend = "pinecone"
//! host = "https://tableindex-abc123.svc.us-east-1.pinecone.io"
//! api_key = "${PINECONE_API_KEY}"
//! namespace_soft_cap = 100
//! eviction = "least_recently_indexed"
//!
//! [embedding]
//! api_key = "${COHERE_API_KEY}"
//! model = "embed-v4.0"
//!
//! [llm]
//! api_key = "${GROQ_API_KEY}"
//! model = "llama-3.1-8b-instant"
//!
//! [retrieval]
//! top_k = 5
//!
//! [generation]
//! max_retries = 2
//!
//! [timeouts]
//! database_seconds = 20
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::connection::ConnectionSpec;
use crate::sql::dialect::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named database connections.
    pub connections: HashMap<String, ConnectionSettings>,

    /// Vector index configuration.
    pub index: IndexSettings,

    /// Embedding service configuration.
    pub embedding: EmbeddingSettings,

    /// Language model configuration.
    pub llm: LlmSettings,

    /// Schema chunking configuration.
    pub chunking: ChunkingSettings,

    /// Retrieval configuration.
    pub retrieval: RetrievalSettings,

    /// Generation loop configuration.
    pub generation: GenerationSettings,

    /// Timeouts for external calls.
    pub timeouts: TimeoutSettings,
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Database dialect (postgresql, mysql, oracle, sqlite).
    pub dialect: String,

    /// Server hostname (supports ${ENV_VAR} expansion).
    #[serde(default)]
    pub host: String,

    /// Port (optional, uses dialect default).
    #[serde(default)]
    pub port: Option<u16>,

    /// Username (supports ${ENV_VAR} expansion).
    #[serde(default)]
    pub username: Option<String>,

    /// Password (supports ${ENV_VAR} expansion).
    #[serde(default)]
    pub password: Option<String>,

    /// Database name, Oracle service name, or SQLite file path.
    pub database: String,

    /// Default schema for this connection.
    #[serde(default)]
    pub schema_name: Option<String>,
}

impl ConnectionSettings {
    /// Build a connection spec with environment variables expanded.
    pub fn resolve(&self) -> Result<ConnectionSpec, SettingsError> {
        let dialect: Dialect = self
            .dialect
            .parse()
            .map_err(|e: crate::sql::UnsupportedDialect| SettingsError::InvalidConfig(e.to_string()))?;

        let expand_opt = |value: &Option<String>| -> Result<Option<String>, SettingsError> {
            value.as_deref().map(expand_env_vars).transpose()
        };

        Ok(ConnectionSpec {
            dialect,
            host: expand_env_vars(&self.host)?,
            port: self.port,
            username: expand_opt(&self.username)?,
            password: expand_opt(&self.password)?,
            database: expand_env_vars(&self.database)?,
            schema_name: self.schema_name.clone(),
            tables: Vec::new(),
        })
    }
}

/// Which vector index implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// Pinecone serverless index over REST.
    #[default]
    Pinecone,
    /// Local SQLite file with brute-force cosine search.
    Local,
}

/// What to do when the namespace count reaches the soft cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Log a capacity warning and keep everything.
    #[default]
    None,
    /// Delete the namespace indexed longest ago by this process.
    LeastRecentlyIndexed,
}

/// Vector index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Index backend.
    pub backend: IndexBackend,

    /// Pinecone index host URL (supports ${ENV_VAR} expansion).
    pub host: String,

    /// Pinecone API key (supports ${ENV_VAR} expansion).
    pub api_key: String,

    /// Path of the local index database.
    pub local_path: Option<String>,

    /// Namespace count at which a capacity warning is raised.
    pub namespace_soft_cap: usize,

    /// Eviction policy applied at the soft cap.
    pub eviction: EvictionPolicy,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Pinecone,
            host: "${PINECONE_INDEX_HOST}".to_string(),
            api_key: "${PINECONE_API_KEY}".to_string(),
            local_path: None,
            namespace_soft_cap: 100,
            eviction: EvictionPolicy::None,
        }
    }
}

/// Embedding service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// API base URL.
    pub base_url: String,

    /// API key (supports ${ENV_VAR} expansion).
    pub api_key: String,

    /// Embedding model, shared by document and query modes.
    pub model: String,

    /// Maximum texts per request.
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.cohere.com".to_string(),
            api_key: "${COHERE_API_KEY}".to_string(),
            model: "embed-v4.0".to_string(),
            batch_size: 96,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible API base URL.
    pub base_url: String,

    /// API key (supports ${ENV_VAR} expansion).
    pub api_key: String,

    /// Model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Completion token limit.
    pub max_completion_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: "${GROQ_API_KEY}".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.1,
            max_completion_tokens: 512,
        }
    }
}

/// Schema chunking configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Target chunk size in words.
    pub chunk_size: usize,

    /// Words shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1536,
            chunk_overlap: 100,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks retrieved per query.
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Generation loop configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Maximum completion attempts per request.
    pub max_retries: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

/// Timeouts for external calls, in seconds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub database_seconds: u64,
    pub index_seconds: u64,
    pub embedding_seconds: u64,
    pub llm_seconds: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            database_seconds: 20,
            index_seconds: 20,
            embedding_seconds: 20,
            llm_seconds: 20,
        }
    }
}

impl TimeoutSettings {
    pub fn database(&self) -> Duration {
        Duration::from_secs(self.database_seconds)
    }

    pub fn index(&self) -> Duration {
        Duration::from_secs(self.index_seconds)
    }

    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_seconds)
    }

    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_seconds)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TXT2SQL_CONFIG`
    /// 2. `./txt2sql.toml`
    /// 3. `~/.config/txt2sql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("TXT2SQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("txt2sql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("txt2sql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunking.chunk_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "chunking.chunk_size must be positive".to_string(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(SettingsError::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(SettingsError::InvalidConfig(
                "retrieval.top_k must be positive".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "embedding.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// Path of the local vector index database.
    pub fn local_index_path(&self) -> Option<PathBuf> {
        match &self.index.local_path {
            Some(path) => expand_env_vars(path).ok().map(PathBuf::from),
            None => dirs::data_dir().map(|d| d.join("txt2sql").join("index.db")),
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let name: String = std::iter::from_fn(|| chars.next_if(|&ch| ch != '}')).collect();
            chars.next(); // consume '}'
            name
        } else {
            // $VAR (ends at non-alphanumeric/underscore)
            std::iter::from_fn(|| chars.next_if(|&ch| ch.is_alphanumeric() || ch == '_')).collect()
        };

        if var_name.is_empty() {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
