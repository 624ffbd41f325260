//! Database layer for NewsRAG
//!
//! Provides:
//! - SeaORM entity models
//! - The `Store` trait and its Postgres / in-memory implementations
//! - Connection pool management and schema bootstrap
//! - Bounded retry for transient store failures

pub mod models;
mod memory;
mod repository;
mod store;

pub use memory::MemoryStore;
pub use repository::PgStore;
pub use store::{ChunkMatch, ChunkMetadata, ChunkRecord, NewArticle, Store};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::StoreUnavailable {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Get the underlying connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::StoreUnavailable {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }

    /// Create the articles/chunks tables and the vector index if absent.
    ///
    /// `dimension` must match the embedder's output width; inserts and
    /// searches against a column of a different width fail with a
    /// schema-mismatch error.
    pub async fn ensure_schema(&self, dimension: usize) -> Result<()> {
        self.conn
            .execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
            .await
            .map_err(map_db_err)?;

        self.conn
            .execute_unprepared(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS articles (
                    id UUID PRIMARY KEY,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    url TEXT UNIQUE NOT NULL,
                    published_on TEXT NOT NULL,
                    source TEXT NOT NULL,
                    embedding vector({dim}),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                dim = dimension
            ))
            .await
            .map_err(map_db_err)?;

        self.conn
            .execute_unprepared(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS chunks (
                    id UUID PRIMARY KEY,
                    article_id UUID NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                    chunk_index INTEGER NOT NULL,
                    content TEXT NOT NULL,
                    metadata JSONB NOT NULL,
                    embedding vector({dim}),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (article_id, chunk_index)
                )
                "#,
                dim = dimension
            ))
            .await
            .map_err(map_db_err)?;

        self.conn
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS chunks_article_id_idx ON chunks (article_id)",
            )
            .await
            .map_err(map_db_err)?;

        self.conn
            .execute_unprepared(
                r#"
                CREATE INDEX IF NOT EXISTS chunks_embedding_idx
                ON chunks USING ivfflat (embedding vector_l2_ops)
                WITH (lists = 100)
                "#,
            )
            .await
            .map_err(map_db_err)?;

        info!(dimension, "Schema ensured");
        Ok(())
    }
}

/// Classify a SeaORM error into the shared taxonomy.
///
/// Connection and pool-acquisition failures become `StoreUnavailable` so
/// call sites can retry; pgvector dimension complaints become
/// `SchemaMismatch`; everything else passes through as a database error.
pub(crate) fn map_db_err(err: DbErr) -> AppError {
    match &err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => AppError::StoreUnavailable {
            message: err.to_string(),
        },
        _ => {
            let msg = err.to_string();
            if msg.contains("dimensions") {
                AppError::SchemaMismatch { message: msg }
            } else {
                AppError::Database(err)
            }
        }
    }
}

/// Run a store operation, retrying `StoreUnavailable` with exponential
/// backoff for a bounded window. All other errors surface immediately.
pub async fn with_store_retry<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(100),
        max_elapsed_time: Some(Duration::from_secs(10)),
        ..ExponentialBackoff::default()
    };

    retry(policy, || async {
        op().await.map_err(|e| {
            if e.is_retryable() {
                tracing::warn!(error = %e, "Store unavailable, retrying");
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .await
}
