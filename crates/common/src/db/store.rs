//! The `Store` trait: the persistence boundary of the pipeline
//!
//! Both the Postgres repository and the in-memory test double implement
//! this contract, so the ingestion processor and the retriever are
//! exercised against the same semantics in tests as in production.

use crate::db::models::{Article, Chunk};
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured metadata duplicated from the article onto every chunk so a
/// chunk match carries its retrieval-time context without a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub title: String,
    pub url: String,
    pub date: String,
    pub chunk_index: i32,
}

/// A new article awaiting insertion
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub url: String,
    pub published_on: String,
    pub source: String,
    /// Optional article-level vector, written for inspection only
    pub embedding: Option<Vec<f32>>,
}

/// A chunk awaiting insertion, paired with its embedding
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub index: i32,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// Result from nearest-neighbor chunk search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMatch {
    pub article_id: Uuid,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Euclidean (L2) distance to the query vector; lower is more relevant
    pub distance: f64,
}

/// Persistent repository of articles and chunks.
///
/// All operations are transactionally consistent per call. Lookup misses
/// are `Ok(None)`/empty results, never errors.
#[async_trait]
pub trait Store: Send + Sync {
    /// Point lookup by canonical URL
    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>>;

    /// Point lookup by id
    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>>;

    /// Insert one article together with all of its chunks in a single
    /// transaction. Fails with `DuplicateUrl` if the unique constraint
    /// is violated (including by a concurrent ingestion); any failure
    /// leaves neither the article row nor any chunk behind.
    async fn insert_article_with_chunks(
        &self,
        article: NewArticle,
        chunks: Vec<ChunkRecord>,
    ) -> Result<Uuid>;

    /// All stored chunks for an article, ordered by chunk_index
    async fn list_chunks(&self, article_id: Uuid) -> Result<Vec<Chunk>>;

    /// Nearest chunks by L2 distance, closest first
    async fn nearest_chunks(&self, embedding: &[f32], limit: usize) -> Result<Vec<ChunkMatch>>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;

    /// Nearest articles, derived from chunk search over a widened limit.
    ///
    /// Candidate article ids are collected from `nearest_chunks` in
    /// closest-chunk-first order, deduplicated first-seen, and capped to
    /// `limit`. Article relevance therefore tracks the same distance
    /// metric as chunk relevance rather than a separate article-level
    /// embedding.
    async fn nearest_articles(&self, embedding: &[f32], limit: usize) -> Result<Vec<Article>> {
        let widened = limit.saturating_mul(4).max(limit);
        let matches = self.nearest_chunks(embedding, widened).await?;

        let mut candidate_ids: Vec<Uuid> = Vec::new();
        for m in matches {
            if !candidate_ids.contains(&m.article_id) {
                candidate_ids.push(m.article_id);
            }
        }
        candidate_ids.truncate(limit);

        let mut articles = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            if let Some(article) = self.find_article_by_id(id).await? {
                articles.push(article);
            }
        }
        Ok(articles)
    }
}
