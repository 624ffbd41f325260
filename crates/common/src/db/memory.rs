//! In-memory implementation of the `Store` trait
//!
//! A process-local store honoring the same contracts as the Postgres
//! repository: unique URLs, all-or-nothing chunk insertion, exact L2
//! distance ordering, dimension checking. Used by pipeline tests and
//! offline development, not by production binaries.

use crate::db::models::{Article, Chunk};
use crate::db::store::{ChunkMatch, ChunkRecord, NewArticle, Store};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::RwLock;
use uuid::Uuid;

struct StoredChunk {
    id: Uuid,
    article_id: Uuid,
    record: ChunkRecord,
}

#[derive(Default)]
struct Inner {
    articles: Vec<Article>,
    chunks: Vec<StoredChunk>,
}

/// RwLock-backed store for tests and offline runs
pub struct MemoryStore {
    dimension: usize,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store expecting vectors of the given width
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: RwLock::new(Inner::default()),
        }
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(AppError::SchemaMismatch {
                message: format!(
                    "expected {} dimensions, not {}",
                    self.dimension,
                    embedding.len()
                ),
            });
        }
        Ok(())
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.articles.iter().find(|a| a.url == url).cloned())
    }

    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_article_with_chunks(
        &self,
        article: NewArticle,
        chunks: Vec<ChunkRecord>,
    ) -> Result<Uuid> {
        // All validation happens before the first write, so a rejected
        // chunk cannot leave a chunkless article behind
        if let Some(ref embedding) = article.embedding {
            self.check_dimension(embedding)?;
        }
        for chunk in &chunks {
            self.check_dimension(&chunk.embedding)?;
        }

        let mut inner = self.inner.write().expect("store lock poisoned");
        if inner.articles.iter().any(|a| a.url == article.url) {
            return Err(AppError::DuplicateUrl { url: article.url });
        }

        let id = Uuid::new_v4();
        let now = chrono::Utc::now().into();
        inner.articles.push(Article {
            id,
            title: article.title,
            content: article.content,
            url: article.url,
            published_on: article.published_on,
            source: article.source,
            created_at: now,
            updated_at: now,
        });
        for record in chunks {
            inner.chunks.push(StoredChunk {
                id: Uuid::new_v4(),
                article_id: id,
                record,
            });
        }
        Ok(id)
    }

    async fn list_chunks(&self, article_id: Uuid) -> Result<Vec<Chunk>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut chunks: Vec<Chunk> = inner
            .chunks
            .iter()
            .filter(|c| c.article_id == article_id)
            .map(|c| Chunk {
                id: c.id,
                article_id: c.article_id,
                chunk_index: c.record.index,
                content: c.record.content.clone(),
                metadata: serde_json::to_value(&c.record.metadata).unwrap_or_default(),
                created_at: chrono::Utc::now().into(),
            })
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn nearest_chunks(&self, embedding: &[f32], limit: usize) -> Result<Vec<ChunkMatch>> {
        self.check_dimension(embedding)?;

        let inner = self.inner.read().expect("store lock poisoned");
        let mut matches: Vec<ChunkMatch> = inner
            .chunks
            .iter()
            .map(|c| ChunkMatch {
                article_id: c.article_id,
                content: c.record.content.clone(),
                metadata: c.record.metadata.clone(),
                distance: l2_distance(embedding, &c.record.embedding),
            })
            .collect();
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
