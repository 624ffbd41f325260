//! Readable-content extraction from raw article HTML
//!
//! Strips boilerplate elements from the parsed document, then walks a
//! priority list of container selectors and keeps only substantial
//! paragraphs. Cuts navigation, bylines, and cookie banners without a
//! full readability engine.

use newsrag_common::errors::{AppError, Result};
use scraper::{ElementRef, Html, Selector};

/// Elements removed from the document before any paragraph is read
const BOILERPLATE_SELECTOR: &str =
    "script, style, nav, footer, header, aside, .ads, .comments, .social-media, .related-articles";

/// Container selectors tried in priority order. The first one present in
/// the document wins, even if its paragraphs all end up filtered out.
const CONTAINER_SELECTORS: &[&str] = &[
    "article",
    ".article",
    ".post",
    ".content",
    ".article-content",
    ".story-content",
    ".entry-content",
    ".post-content",
    "main",
];

/// Title, body, and publication date pulled out of one HTML document
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedArticle {
    pub title: String,
    /// Newline-joined paragraphs
    pub content: String,
    /// Publication date normalized to YYYY-MM-DD
    pub published_on: String,
}

/// Compiled-selector extractor, built once per worker
pub struct HtmlExtractor {
    boilerplate: Selector,
    containers: Vec<Selector>,
    paragraph: Selector,
    title: Selector,
    og_title: Selector,
    published_time: Selector,
    pubdate: Selector,
    date_meta: Selector,
    min_paragraph_len: usize,
}

impl HtmlExtractor {
    pub fn new(min_paragraph_len: usize) -> Self {
        let containers = CONTAINER_SELECTORS
            .iter()
            .map(|s| Selector::parse(s).expect("container selector"))
            .collect();

        Self {
            boilerplate: Selector::parse(BOILERPLATE_SELECTOR).expect("boilerplate selector"),
            containers,
            paragraph: Selector::parse("p").expect("paragraph selector"),
            title: Selector::parse("title").expect("title selector"),
            og_title: Selector::parse(r#"meta[property="og:title"]"#).expect("og:title selector"),
            published_time: Selector::parse(r#"meta[property="article:published_time"]"#)
                .expect("published_time selector"),
            pubdate: Selector::parse(r#"meta[name="pubdate"]"#).expect("pubdate selector"),
            date_meta: Selector::parse(r#"meta[name="date"]"#).expect("date selector"),
            min_paragraph_len,
        }
    }

    /// Extract the readable article from a raw HTML document.
    ///
    /// Fails with `ExtractionFailed` when no substantial paragraph
    /// survives filtering.
    pub fn extract(&self, html: &str, url: &str) -> Result<ExtractedArticle> {
        let mut document = Html::parse_document(html);

        let title = self.extract_title(&document);
        self.strip_boilerplate(&mut document);
        let content = self.extract_body(&document);

        if content.trim().is_empty() {
            return Err(AppError::ExtractionFailed {
                url: url.to_string(),
                message: "No readable paragraphs found".to_string(),
            });
        }

        Ok(ExtractedArticle {
            title,
            content,
            published_on: self.extract_date(&document),
        })
    }

    /// `<title>` text, overridden by `og:title` when the latter is longer
    fn extract_title(&self, document: &Html) -> String {
        let mut title = document
            .select(&self.title)
            .next()
            .map(|el| collect_text(el))
            .unwrap_or_default();

        if let Some(og) = document
            .select(&self.og_title)
            .next()
            .and_then(|el| el.value().attr("content"))
        {
            let og = og.trim();
            if og.len() > title.len() {
                title = og.to_string();
            }
        }

        title
    }

    /// Detach boilerplate subtrees so neither the fallback path nor a
    /// matched container can pick their paragraphs up
    fn strip_boilerplate(&self, document: &mut Html) {
        let ids: Vec<_> = document.select(&self.boilerplate).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    fn extract_body(&self, document: &Html) -> String {
        for selector in &self.containers {
            if let Some(container) = document.select(selector).next() {
                return self.join_paragraphs(container.select(&self.paragraph));
            }
        }

        // No recognized container, fall back to every paragraph on the page
        self.join_paragraphs(document.select(&self.paragraph))
    }

    fn join_paragraphs<'a>(&self, paragraphs: impl Iterator<Item = ElementRef<'a>>) -> String {
        let mut content = String::new();
        for paragraph in paragraphs {
            let text = collect_text(paragraph);
            if text.len() > self.min_paragraph_len {
                content.push_str(&text);
                content.push('\n');
            }
        }
        content
    }

    /// Publication date from meta tags, normalized to YYYY-MM-DD;
    /// today's date when absent or unparseable
    fn extract_date(&self, document: &Html) -> String {
        let meta_date = document
            .select(&self.published_time)
            .next()
            .or_else(|| document.select(&self.pubdate).next())
            .or_else(|| document.select(&self.date_meta).next())
            .and_then(|el| el.value().attr("content"));

        meta_date
            .and_then(normalize_date)
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string())
    }
}

fn collect_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for piece in element.text() {
        out.push_str(piece);
    }
    out.trim().to_string()
}

fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.format("%Y-%m-%d").to_string());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_PARA: &str = "This paragraph carries well over one hundred characters of actual \
        reporting so the substantial-paragraph filter keeps it in the extracted article body.";

    fn extractor() -> HtmlExtractor {
        HtmlExtractor::new(100)
    }

    #[test]
    fn test_extracts_paragraphs_from_article_container() {
        let html = format!(
            "<html><head><title>Story</title></head><body>\
             <nav><p>{LONG_PARA} navigation variant</p></nav>\
             <article><p>{LONG_PARA}</p><p>short</p></article>\
             </body></html>"
        );
        let article = extractor().extract(&html, "https://news.example/a").unwrap();
        assert_eq!(article.title, "Story");
        assert!(article.content.contains(LONG_PARA));
        assert!(!article.content.contains("short"));
        assert!(!article.content.contains("navigation variant"));
    }

    #[test]
    fn test_container_priority_over_fallback() {
        // both .post and main exist; .post comes first in priority
        let html = format!(
            "<html><body>\
             <div class=\"post\"><p>{LONG_PARA} post body</p></div>\
             <main><p>{LONG_PARA} main body</p></main>\
             </body></html>"
        );
        let article = extractor().extract(&html, "https://news.example/a").unwrap();
        assert!(article.content.contains("post body"));
        assert!(!article.content.contains("main body"));
    }

    #[test]
    fn test_boilerplate_stripped_on_fallback_path() {
        // no recognized container, so every surviving paragraph is used
        let html = format!(
            "<html><body>\
             <nav><p>{LONG_PARA} subscribe to our newsletter today</p></nav>\
             <div><p>{LONG_PARA}</p></div>\
             <footer><p>{LONG_PARA} all rights reserved worldwide</p></footer>\
             </body></html>"
        );
        let article = extractor().extract(&html, "https://news.example/a").unwrap();
        assert!(article.content.contains(LONG_PARA));
        assert!(!article.content.contains("subscribe to our newsletter"));
        assert!(!article.content.contains("all rights reserved"));
    }

    #[test]
    fn test_boilerplate_stripped_inside_matched_container() {
        let html = format!(
            "<html><body><main>\
             <aside><p>{LONG_PARA} sponsored content placement</p></aside>\
             <div class=\"ads\"><p>{LONG_PARA} buy one get one free</p></div>\
             <p>{LONG_PARA}</p>\
             </main></body></html>"
        );
        let article = extractor().extract(&html, "https://news.example/a").unwrap();
        assert!(article.content.contains(LONG_PARA));
        assert!(!article.content.contains("sponsored content"));
        assert!(!article.content.contains("buy one get one"));
    }

    #[test]
    fn test_inline_script_text_excluded_from_paragraph() {
        let html = format!(
            "<html><body><article>\
             <p>{LONG_PARA}<script>window.trackPageView()</script></p>\
             </article></body></html>"
        );
        let article = extractor().extract(&html, "https://news.example/a").unwrap();
        assert!(article.content.contains(LONG_PARA));
        assert!(!article.content.contains("trackPageView"));
    }

    #[test]
    fn test_fallback_to_all_paragraphs() {
        let html = format!("<html><body><div><p>{LONG_PARA}</p></div></body></html>");
        let article = extractor().extract(&html, "https://news.example/a").unwrap();
        assert!(article.content.contains(LONG_PARA));
    }

    #[test]
    fn test_empty_extraction_is_an_error() {
        let html = "<html><body><article><p>too short</p></article></body></html>";
        let err = extractor()
            .extract(html, "https://news.example/a")
            .unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed { .. }));
    }

    #[test]
    fn test_og_title_wins_when_longer() {
        let html = format!(
            "<html><head><title>Short</title>\
             <meta property=\"og:title\" content=\"A Much Longer Open Graph Title\">\
             </head><body><article><p>{LONG_PARA}</p></article></body></html>"
        );
        let article = extractor().extract(&html, "https://news.example/a").unwrap();
        assert_eq!(article.title, "A Much Longer Open Graph Title");
    }

    #[test]
    fn test_published_time_meta_normalized() {
        let html = format!(
            "<html><head>\
             <meta property=\"article:published_time\" content=\"2026-03-14T09:30:00Z\">\
             </head><body><article><p>{LONG_PARA}</p></article></body></html>"
        );
        let article = extractor().extract(&html, "https://news.example/a").unwrap();
        assert_eq!(article.published_on, "2026-03-14");
    }

    #[test]
    fn test_missing_date_defaults_to_today() {
        let html = format!("<html><body><article><p>{LONG_PARA}</p></article></body></html>");
        let article = extractor().extract(&html, "https://news.example/a").unwrap();
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(article.published_on, today);
    }
}
