//! Ingestion processor
//!
//! Core pipeline for one article URL: fetch, extract, chunk, embed, and
//! store. A URL that is already stored short-circuits to `Skipped`
//! before any fetch or embedding work happens; the database unique
//! constraint is the authority when two workers race on the same URL.

use crate::chunker::{chunk_article, ChunkSource, ChunkingConfig};
use crate::extract::HtmlExtractor;
use crate::fetch::Fetch;
use newsrag_common::db::{with_store_retry, ChunkRecord, NewArticle, Store};
use newsrag_common::embeddings::Embedder;
use newsrag_common::errors::{AppError, Result};
use newsrag_common::metrics::record_ingestion;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of one ingestion attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The article and all of its chunks were stored
    Stored { article_id: Uuid, chunk_count: usize },
    /// The URL was already stored; nothing was written
    Skipped,
}

pub struct IngestionProcessor {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    fetcher: Arc<dyn Fetch>,
    extractor: HtmlExtractor,
    chunking: ChunkingConfig,
}

impl IngestionProcessor {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        fetcher: Arc<dyn Fetch>,
        min_paragraph_len: usize,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            fetcher,
            extractor: HtmlExtractor::new(min_paragraph_len),
            chunking,
        }
    }

    /// Run the full pipeline for one URL.
    ///
    /// Either the article and every chunk become readable together, or
    /// nothing does. Duplicate URLs, including ones that appear between
    /// the pre-check and the insert, resolve to `Skipped`.
    #[instrument(skip(self), fields(source = %source, url = %url))]
    pub async fn ingest(&self, source: &str, url: &str) -> Result<IngestOutcome> {
        let start = Instant::now();
        let outcome = self.run_pipeline(source, url).await;

        let label = match &outcome {
            Ok(IngestOutcome::Stored { .. }) => "stored",
            Ok(IngestOutcome::Skipped) => "skipped",
            Err(e) => stage_label(e),
        };
        let chunk_count = match &outcome {
            Ok(IngestOutcome::Stored { chunk_count, .. }) => *chunk_count,
            _ => 0,
        };
        record_ingestion(start.elapsed().as_secs_f64(), source, label, chunk_count);

        outcome
    }

    async fn run_pipeline(&self, source: &str, url: &str) -> Result<IngestOutcome> {
        let store = Arc::clone(&self.store);
        if let Some(existing) = with_store_retry(|| store.find_article_by_url(url)).await? {
            info!(article_id = %existing.id, "Article already stored, skipping");
            return Ok(IngestOutcome::Skipped);
        }

        let html = self.fetcher.fetch_html(url).await?;
        let extracted = self.extractor.extract(&html, url)?;

        let chunk_source = ChunkSource {
            title: &extracted.title,
            content: &extracted.content,
            url,
            published_on: &extracted.published_on,
            source,
        };
        let drafts = chunk_article(&chunk_source, &self.chunking);

        // One batch call covers the article-level vector and every chunk
        let mut texts = Vec::with_capacity(drafts.len() + 1);
        texts.push(format!("{}\n\n{}", extracted.title, extracted.content));
        texts.extend(drafts.iter().map(|d| d.content.clone()));
        let mut embeddings = self.embedder.embed_batch(&texts).await?;
        let article_embedding = embeddings.remove(0);

        let article = NewArticle {
            title: extracted.title.clone(),
            content: extracted.content,
            url: url.to_string(),
            published_on: extracted.published_on,
            source: source.to_string(),
            embedding: Some(article_embedding),
        };

        let records: Vec<ChunkRecord> = drafts
            .into_iter()
            .zip(embeddings)
            .map(|(draft, embedding)| ChunkRecord {
                index: draft.index,
                content: draft.content,
                metadata: draft.metadata,
                embedding,
            })
            .collect();
        let chunk_count = records.len();

        // Article and chunks commit together; a failed write leaves the
        // URL fully absent so a later attempt starts from scratch
        let store = Arc::clone(&self.store);
        let article_id = match with_store_retry(|| {
            store.insert_article_with_chunks(article.clone(), records.clone())
        })
        .await
        {
            Ok(id) => id,
            Err(AppError::DuplicateUrl { .. }) => {
                // Lost a race with a concurrent worker; their copy wins
                warn!("Concurrent ingestion stored this URL first, skipping");
                return Ok(IngestOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        info!(
            article_id = %article_id,
            chunk_count,
            title = %extracted.title,
            "Article ingested"
        );

        Ok(IngestOutcome::Stored {
            article_id,
            chunk_count,
        })
    }
}

fn stage_label(err: &AppError) -> &'static str {
    match err {
        AppError::FetchFailed { .. } => "fetch_failed",
        AppError::ExtractionFailed { .. } => "extraction_failed",
        AppError::EmbeddingFailed { .. } => "embedding_failed",
        AppError::StoreUnavailable { .. } => "store_unavailable",
        AppError::SchemaMismatch { .. } => "schema_mismatch",
        _ => "error",
    }
}
