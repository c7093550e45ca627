//! Configuration module for txt2sql.
//!
//! Handles connection specifications, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{ConnectionConfigError, ConnectionSpec};
pub use settings::{
    expand_env_vars, ChunkingSettings, ConnectionSettings, EmbeddingSettings, EvictionPolicy,
    GenerationSettings, IndexBackend, IndexSettings, LlmSettings, RetrievalSettings, Settings,
    SettingsError, TimeoutSettings,
};
