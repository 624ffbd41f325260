//! Text chunking module
//!
//! Splits the combined title-plus-body text of a cleaned article into
//! overlapping chunks for embedding, and stamps each with the article
//! metadata retrieval reads back later.

use newsrag_common::db::ChunkMetadata;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A chunk ready for embedding, indexed 0..N-1 in document order
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub index: i32,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Cleaned article fields the chunker needs for text and metadata
pub struct ChunkSource<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub url: &'a str,
    pub published_on: &'a str,
    pub source: &'a str,
}

/// Split one article into metadata-stamped chunks.
///
/// The title is prepended to the body so every leading chunk carries the
/// article's subject. A short article yields exactly one chunk.
pub fn chunk_article(article: &ChunkSource<'_>, config: &ChunkingConfig) -> Vec<ChunkDraft> {
    let full_text = format!("{}\n\n{}", article.title, article.content);

    // Overlap must be smaller than the chunk size; a bad config falls
    // back to non-overlapping chunks instead of aborting the article
    let chunk_config = ChunkConfig::new(config.chunk_size)
        .with_overlap(config.chunk_overlap)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid chunk overlap, splitting without overlap");
            ChunkConfig::new(config.chunk_size)
        });
    let splitter = TextSplitter::new(chunk_config);

    let drafts: Vec<ChunkDraft> = splitter
        .chunks(&full_text)
        .enumerate()
        .map(|(index, text)| ChunkDraft {
            index: index as i32,
            content: text.to_string(),
            metadata: ChunkMetadata {
                source: article.source.to_string(),
                title: article.title.to_string(),
                url: article.url.to_string(),
                date: article.published_on.to_string(),
                chunk_index: index as i32,
            },
        })
        .collect();

    debug!(
        input_len = full_text.len(),
        chunk_count = drafts.len(),
        chunk_size = config.chunk_size,
        "Article chunked"
    );

    drafts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source<'a>(title: &'a str, content: &'a str) -> ChunkSource<'a> {
        ChunkSource {
            title,
            content,
            url: "https://news.example/story",
            published_on: "2026-08-30",
            source: "unit",
        }
    }

    #[test]
    fn test_short_article_yields_one_chunk() {
        let article = source("Headline", "Sentence one. Sentence two.");
        let chunks = chunk_article(&article, &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("Headline"));
        assert!(chunks[0].content.contains("Sentence two."));
    }

    #[test]
    fn test_long_article_chunks_are_contiguous_and_bounded() {
        let body = "A reasonably long sentence about current events in the world today. "
            .repeat(60);
        let config = ChunkingConfig::default();
        let article = source("Headline", &body);
        let chunks = chunk_article(&article, &config);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as i32);
            assert_eq!(chunk.metadata.chunk_index, i as i32);
            assert!(chunk.content.len() <= config.chunk_size);
        }
    }

    #[test]
    fn test_title_included_in_leading_chunk() {
        let body = "Body paragraph text here. ".repeat(100);
        let article = source("Unmistakable Headline", &body);
        let chunks = chunk_article(&article, &ChunkingConfig::default());
        assert!(chunks[0].content.starts_with("Unmistakable Headline"));
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let body = "Deterministic splitting matters because chunk ids key on position. "
            .repeat(70);
        let config = ChunkingConfig::default();
        let article = source("Headline", &body);

        let first = chunk_article(&article, &config);
        let second = chunk_article(&article, &config);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.content, b.content);
        }
    }

    #[test]
    fn test_metadata_stamped_on_every_chunk() {
        let body = "Another fairly long sentence to grow the article body. ".repeat(80);
        let article = source("Headline", &body);
        let chunks = chunk_article(&article, &ChunkingConfig::default());
        for chunk in &chunks {
            assert_eq!(chunk.metadata.url, "https://news.example/story");
            assert_eq!(chunk.metadata.source, "unit");
            assert_eq!(chunk.metadata.date, "2026-08-30");
            assert_eq!(chunk.metadata.title, "Headline");
        }
    }
}
