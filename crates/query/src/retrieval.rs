//! URL-aware retrieval
//!
//! Three paths, tried in order:
//! 1. The question names a URL that is already stored: return that
//!    article directly, with no embedding call at all.
//! 2. The question names an unknown URL: ingest it inline under the
//!    `dynamic_fetch` source, then return it.
//! 3. Otherwise, or when the inline ingest fails: semantic search over
//!    chunks, with articles derived from the same chunk ranking.

use newsrag_common::db::models::Article;
use newsrag_common::db::{with_store_retry, Store};
use newsrag_common::embeddings::Embedder;
use newsrag_common::errors::Result;
use newsrag_ingestion::IngestionProcessor;
use regex_lite::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, instrument, warn};

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("url regex"));

/// Chunks pulled into the answer context
const CHUNK_LIMIT: usize = 8;
/// Articles cited as sources
const ARTICLE_LIMIT: usize = 5;

/// Source label for articles ingested on demand from a query URL
pub const DYNAMIC_FETCH_SOURCE: &str = "dynamic_fetch";

/// How the context for an answer was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// URL named in the query was already stored
    UrlCached,
    /// URL named in the query was ingested inline
    UrlIngested,
    /// Nearest-neighbor search over chunk embeddings
    Semantic,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::UrlCached => "url_cached",
            RetrievalMode::UrlIngested => "url_ingested",
            RetrievalMode::Semantic => "semantic",
        }
    }
}

/// Context gathered for one question
#[derive(Debug)]
pub struct Retrieved {
    pub mode: RetrievalMode,
    pub articles: Vec<Article>,
    /// Preformatted chunk context; present only on the semantic path
    pub chunk_context: Option<String>,
}

/// Pull the first http(s) URL out of free-form question text,
/// trimming punctuation that usually trails a pasted link.
pub fn extract_first_url(query: &str) -> Option<String> {
    let raw = URL_PATTERN.find(query)?.as_str();
    let trimmed = raw.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '"', '\'']);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub struct Retriever {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    processor: Arc<IngestionProcessor>,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        processor: Arc<IngestionProcessor>,
    ) -> Self {
        Self {
            store,
            embedder,
            processor,
        }
    }

    #[instrument(skip(self), fields(query_len = query.len()))]
    pub async fn retrieve(&self, query: &str) -> Result<Retrieved> {
        if let Some(url) = extract_first_url(query) {
            if let Some(retrieved) = self.retrieve_by_url(&url).await? {
                return Ok(retrieved);
            }
        }
        self.retrieve_semantic(query).await
    }

    /// URL fast path and inline ingest. Returns `None` when the URL
    /// could not be made available, which sends the query on to
    /// semantic search instead of failing it. Lookup errors are
    /// treated the same way as ingestion errors.
    async fn retrieve_by_url(&self, url: &str) -> Result<Option<Retrieved>> {
        let store = Arc::clone(&self.store);
        match with_store_retry(|| store.find_article_by_url(url)).await {
            Ok(Some(article)) => {
                info!(url = %url, "Answering from stored article");
                return Ok(Some(Retrieved {
                    mode: RetrievalMode::UrlCached,
                    articles: vec![article],
                    chunk_context: None,
                }));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(url = %url, error = %e, "URL lookup failed, falling back to semantic search");
                return Ok(None);
            }
        }

        info!(url = %url, "Article not stored, attempting inline ingestion");
        match self.processor.ingest(DYNAMIC_FETCH_SOURCE, url).await {
            Ok(_) => {
                let store = Arc::clone(&self.store);
                match with_store_retry(|| store.find_article_by_url(url)).await {
                    Ok(Some(article)) => Ok(Some(Retrieved {
                        mode: RetrievalMode::UrlIngested,
                        articles: vec![article],
                        chunk_context: None,
                    })),
                    Ok(None) => {
                        warn!(url = %url, "Inline ingestion reported success but article not found");
                        Ok(None)
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "Lookup after inline ingestion failed, falling back to semantic search");
                        Ok(None)
                    }
                }
            }
            Err(e) => {
                // A dead link should not fail the whole question
                warn!(url = %url, error = %e, "Inline ingestion failed, falling back to semantic search");
                Ok(None)
            }
        }
    }

    async fn retrieve_semantic(&self, query: &str) -> Result<Retrieved> {
        let embedding = self.embedder.embed(query).await?;

        let store = Arc::clone(&self.store);
        let chunks = with_store_retry(|| store.nearest_chunks(&embedding, CHUNK_LIMIT)).await?;

        let chunk_context = if chunks.is_empty() {
            None
        } else {
            let formatted: Vec<String> = chunks
                .iter()
                .map(|chunk| {
                    format!(
                        "CHUNK: {}\nSOURCE: {}\nTITLE: {}\nURL: {}\n\n",
                        chunk.content, chunk.metadata.source, chunk.metadata.title, chunk.metadata.url
                    )
                })
                .collect();
            Some(formatted.join("---\n"))
        };

        let store = Arc::clone(&self.store);
        let articles = with_store_retry(|| store.nearest_articles(&embedding, ARTICLE_LIMIT)).await?;

        info!(
            chunk_count = chunks.len(),
            article_count = articles.len(),
            "Semantic retrieval complete"
        );

        Ok(Retrieved {
            mode: RetrievalMode::Semantic,
            articles,
            chunk_context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use newsrag_common::db::{ChunkMetadata, ChunkRecord, MemoryStore, NewArticle, Store};
    use newsrag_common::embeddings::MockEmbedder;
    use newsrag_common::errors::AppError;
    use newsrag_ingestion::{ChunkingConfig, Fetch};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 32;

    const LONG_PARA: &str = "This paragraph carries well over one hundred characters of actual \
        reporting so the substantial-paragraph filter keeps it in the extracted article body.";

    /// Embedder that counts calls, for asserting the URL fast path
    /// never embeds anything
    struct CountingEmbedder {
        inner: MockEmbedder,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: MockEmbedder::new(DIM),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }
        fn model_name(&self) -> &str {
            "counting-mock"
        }
        fn dimension(&self) -> usize {
            DIM
        }
    }

    /// Store whose URL lookups always fail while search still works,
    /// for checking the fallback from the URL path to semantic search
    struct BrokenLookupStore {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl Store for BrokenLookupStore {
        async fn find_article_by_url(&self, _url: &str) -> Result<Option<Article>> {
            Err(AppError::Internal {
                message: "lookup unavailable".to_string(),
            })
        }
        async fn find_article_by_id(&self, id: uuid::Uuid) -> Result<Option<Article>> {
            self.inner.find_article_by_id(id).await
        }
        async fn insert_article_with_chunks(
            &self,
            article: NewArticle,
            chunks: Vec<ChunkRecord>,
        ) -> Result<uuid::Uuid> {
            self.inner.insert_article_with_chunks(article, chunks).await
        }
        async fn list_chunks(
            &self,
            article_id: uuid::Uuid,
        ) -> Result<Vec<newsrag_common::db::models::Chunk>> {
            self.inner.list_chunks(article_id).await
        }
        async fn nearest_chunks(
            &self,
            embedding: &[f32],
            limit: usize,
        ) -> Result<Vec<newsrag_common::db::ChunkMatch>> {
            self.inner.nearest_chunks(embedding, limit).await
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    struct StubFetcher {
        html: String,
    }

    #[async_trait]
    impl Fetch for StubFetcher {
        async fn fetch_html(&self, _url: &str) -> Result<String> {
            Ok(self.html.clone())
        }
    }

    struct FailFetcher;

    #[async_trait]
    impl Fetch for FailFetcher {
        async fn fetch_html(&self, url: &str) -> Result<String> {
            Err(AppError::FetchFailed {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn article_html() -> String {
        format!(
            "<html><head><title>Fetched Story</title></head>\
             <body><article><p>{LONG_PARA}</p></article></body></html>"
        )
    }

    fn retriever_with(
        store: Arc<MemoryStore>,
        embedder: Arc<dyn Embedder>,
        fetcher: Arc<dyn Fetch>,
    ) -> Retriever {
        let processor = Arc::new(IngestionProcessor::new(
            store.clone(),
            Arc::new(MockEmbedder::new(DIM)),
            fetcher,
            100,
            ChunkingConfig::default(),
        ));
        Retriever::new(store, embedder, processor)
    }

    async fn seed_article(store: &MemoryStore, url: &str, title: &str, text: &str) {
        let embedder = MockEmbedder::new(DIM);
        store
            .insert_article_with_chunks(
                NewArticle {
                    title: title.to_string(),
                    content: text.to_string(),
                    url: url.to_string(),
                    published_on: "2026-08-30".to_string(),
                    source: "seed".to_string(),
                    embedding: None,
                },
                vec![ChunkRecord {
                    index: 0,
                    content: text.to_string(),
                    metadata: ChunkMetadata {
                        source: "seed".to_string(),
                        title: title.to_string(),
                        url: url.to_string(),
                        date: "2026-08-30".to_string(),
                        chunk_index: 0,
                    },
                    embedding: embedder.embed(text).await.unwrap(),
                }],
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_extract_first_url() {
        assert_eq!(
            extract_first_url("what does https://news.example/a/b say?"),
            Some("https://news.example/a/b".to_string())
        );
        assert_eq!(
            extract_first_url("see (https://news.example/story)."),
            Some("https://news.example/story".to_string())
        );
        assert_eq!(extract_first_url("no links here"), None);
        assert_eq!(
            extract_first_url("first http://a.example/1 then https://b.example/2"),
            Some("http://a.example/1".to_string())
        );
    }

    #[tokio::test]
    async fn test_url_fast_path_skips_embedding() {
        let store = Arc::new(MemoryStore::new(DIM));
        seed_article(&store, "https://news.example/story", "Stored Story", LONG_PARA).await;

        let embedder = Arc::new(CountingEmbedder::new());
        let retriever = retriever_with(store, embedder.clone(), Arc::new(FailFetcher));

        let retrieved = retriever
            .retrieve("summarize https://news.example/story please")
            .await
            .unwrap();

        assert_eq!(retrieved.mode, RetrievalMode::UrlCached);
        assert_eq!(retrieved.articles.len(), 1);
        assert_eq!(retrieved.articles[0].title, "Stored Story");
        assert!(retrieved.chunk_context.is_none());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_url_ingested_inline() {
        let store = Arc::new(MemoryStore::new(DIM));
        let retriever = retriever_with(
            store.clone(),
            Arc::new(MockEmbedder::new(DIM)),
            Arc::new(StubFetcher {
                html: article_html(),
            }),
        );

        let retrieved = retriever
            .retrieve("what is https://news.example/new about?")
            .await
            .unwrap();

        assert_eq!(retrieved.mode, RetrievalMode::UrlIngested);
        assert_eq!(retrieved.articles.len(), 1);
        assert_eq!(retrieved.articles[0].source, DYNAMIC_FETCH_SOURCE);
        assert!(store
            .find_article_by_url("https://news.example/new")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_url_lookup_failure_falls_back_to_semantic() {
        let inner = Arc::new(MemoryStore::new(DIM));
        seed_article(&inner, "https://news.example/other", "Other Story", LONG_PARA).await;
        let store = Arc::new(BrokenLookupStore { inner });

        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(DIM));
        let processor = Arc::new(IngestionProcessor::new(
            store.clone(),
            embedder.clone(),
            Arc::new(FailFetcher),
            100,
            ChunkingConfig::default(),
        ));
        let retriever = Retriever::new(store, embedder, processor);

        // the failing lookup must not fail the question
        let retrieved = retriever
            .retrieve("what does https://news.example/other report?")
            .await
            .unwrap();
        assert_eq!(retrieved.mode, RetrievalMode::Semantic);
        assert_eq!(retrieved.articles.len(), 1);
        assert_eq!(retrieved.articles[0].title, "Other Story");
    }

    #[tokio::test]
    async fn test_dead_url_falls_back_to_semantic() {
        let store = Arc::new(MemoryStore::new(DIM));
        seed_article(&store, "https://news.example/other", "Other Story", LONG_PARA).await;

        let retriever = retriever_with(
            store,
            Arc::new(MockEmbedder::new(DIM)),
            Arc::new(FailFetcher),
        );

        let retrieved = retriever
            .retrieve("what about https://news.example/dead-link then?")
            .await
            .unwrap();

        assert_eq!(retrieved.mode, RetrievalMode::Semantic);
        assert_eq!(retrieved.articles.len(), 1);
        assert_eq!(retrieved.articles[0].title, "Other Story");
        assert!(retrieved.chunk_context.is_some());
    }

    #[tokio::test]
    async fn test_semantic_retrieval_ranks_by_distance() {
        let store = Arc::new(MemoryStore::new(DIM));
        seed_article(
            &store,
            "https://news.example/match",
            "Match",
            "the budget vote in parliament",
        )
        .await;
        seed_article(
            &store,
            "https://news.example/noise",
            "Noise",
            "a completely unrelated sports result",
        )
        .await;

        let retriever = retriever_with(
            store,
            Arc::new(MockEmbedder::new(DIM)),
            Arc::new(FailFetcher),
        );

        // the mock embedder maps the exact seeded text to distance zero
        let retrieved = retriever
            .retrieve("the budget vote in parliament")
            .await
            .unwrap();

        assert_eq!(retrieved.mode, RetrievalMode::Semantic);
        assert_eq!(retrieved.articles[0].title, "Match");
        let context = retrieved.chunk_context.unwrap();
        assert!(context.contains("CHUNK: the budget vote in parliament"));
    }

    #[tokio::test]
    async fn test_empty_store_semantic_returns_nothing() {
        let store = Arc::new(MemoryStore::new(DIM));
        let retriever = retriever_with(
            store,
            Arc::new(MockEmbedder::new(DIM)),
            Arc::new(FailFetcher),
        );

        let retrieved = retriever.retrieve("anything at all").await.unwrap();
        assert_eq!(retrieved.mode, RetrievalMode::Semantic);
        assert!(retrieved.articles.is_empty());
        assert!(retrieved.chunk_context.is_none());
    }
}
