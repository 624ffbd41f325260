//! NewsRAG ingestion pipeline
//!
//! Fetches article HTML, extracts readable content, chunks it, embeds
//! the chunks, and stores everything behind the `Store` trait. The
//! query service reuses `IngestionProcessor` to ingest a URL inline
//! when a question points at an article that is not stored yet.

pub mod chunker;
pub mod extract;
pub mod fetch;
pub mod processor;

pub use chunker::{chunk_article, ChunkDraft, ChunkSource, ChunkingConfig};
pub use extract::{ExtractedArticle, HtmlExtractor};
pub use fetch::{Fetch, HttpFetcher};
pub use processor::{IngestOutcome, IngestionProcessor};
