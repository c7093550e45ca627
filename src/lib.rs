//! # txt2sql
//!
//! Schema introspection and retrieval-augmented SQL generation across
//! PostgreSQL, MySQL, Oracle and SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Database (postgresql / mysql / oracle / sqlite)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [introspect]
//! ┌─────────────────────────────────────────────────────────┐
//! │          SchemaDocument  +  Namespace (keyer)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [schema::chunk, embed, index]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Vector index, one namespace per table / table set   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [engine, llm]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Validated SQL or recommendations (self-correcting)   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`service::Txt2SqlService`] ties the layers together; the `txt2sql` binary
//! is a thin CLI over it.

pub mod cache;
pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod index;
pub mod introspect;
pub mod llm;
pub mod schema;
pub mod service;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{ConnectionSpec, Settings};
    pub use crate::embed::{Embedder, EmbeddingMode};
    pub use crate::engine::{GenerationResult, OutputKind, QueryGenerationEngine};
    pub use crate::error::{ErrorBody, StatusClass, Txt2SqlError, Txt2SqlResult};
    pub use crate::index::{InsertReport, VectorIndex, VectorIndexManager};
    pub use crate::introspect::{introspector, SchemaIntrospector};
    pub use crate::llm::CompletionModel;
    pub use crate::schema::{Namespace, NamespaceKeyer, SchemaDocument};
    pub use crate::service::{ApiResponse, Txt2SqlService};
    pub use crate::sql::Dialect;
}

pub use error::{Txt2SqlError, Txt2SqlResult};
pub use sql::Dialect;
