//! NewsRAG Common Library
//!
//! Shared code for the NewsRAG services including:
//! - Database access, the `Store` trait, and its Postgres and in-memory
//!   implementations
//! - Embedding client abstraction
//! - Error types and handling
//! - Configuration management
//! - Queue integration
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod queue;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{ChunkMatch, ChunkMetadata, ChunkRecord, MemoryStore, NewArticle, PgStore, Store};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "embedding-001";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
