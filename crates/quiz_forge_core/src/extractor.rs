//! crates/quiz_forge_core/src/extractor.rs
//!
//! Turns source units (fetched pages or uploaded files) into normalized text.
//!
//! Every per-unit problem is a soft failure: the unit is logged and skipped
//! and the rest of the batch carries on. Only an empty batch is an error.

use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{ExtractedText, SourceOrigin, SourceUnit};
use crate::ports::{FetchError, FetchOptions, HttpFetcher};
use crate::settings::PipelineSettings;

/// Elements whose content is never part of the extracted text.
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "iframe", "noscript", "aside", "form", "meta",
];

/// Candidate containers for the main content, most specific first.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    "#content",
    "#main-content",
    ".main-content",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".content",
];

/// Elements that separate words even when the markup has no whitespace between them.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr",
    "td", "th", "table", "blockquote", "pre", "dd", "dt", "figcaption",
];

const HTML_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

//=========================================================================================
// Errors
//=========================================================================================

/// Why a single source unit produced no text. Never escapes a batch.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("malformed URL: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("unsupported content type: {0}")]
    NotHtml(String),
    #[error("upload is not valid UTF-8")]
    InvalidEncoding,
    #[error("extracted text too short ({chars} characters)")]
    TooShort { chars: usize },
}

/// Raised when a batch has nothing to extract from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no sources were provided")]
pub struct EmptyBatch;

//=========================================================================================
// The Extractor
//=========================================================================================

pub struct ContentExtractor {
    fetcher: Arc<dyn HttpFetcher>,
    settings: PipelineSettings,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, settings: PipelineSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Extracts text from every unit, skipping the ones that fail.
    ///
    /// At most `max_sources` units are processed; the rest are dropped with a warning.
    /// Output preserves input order.
    pub async fn extract_batch(
        &self,
        mut units: Vec<SourceUnit>,
    ) -> Result<Vec<ExtractedText>, EmptyBatch> {
        if units.is_empty() {
            return Err(EmptyBatch);
        }
        if units.len() > self.settings.max_sources {
            warn!(
                provided = units.len(),
                cap = self.settings.max_sources,
                "Too many sources; extra sources are ignored"
            );
            units.truncate(self.settings.max_sources);
        }

        let total = units.len();
        let outcomes: Vec<_> = stream::iter(units)
            .map(|unit| async move {
                let outcome = self.extract(&unit).await;
                (unit, outcome)
            })
            .buffered(self.settings.extraction_concurrency.max(1))
            .collect()
            .await;

        let mut extracted = Vec::with_capacity(total);
        for (unit, outcome) in outcomes {
            match outcome {
                Ok(text) => extracted.push(text),
                Err(e) => warn!(source = unit.identifier(), error = %e, "Skipping source"),
            }
        }

        info!(usable = extracted.len(), total, "Extraction finished");
        Ok(extracted)
    }

    /// Extracts text from a single unit.
    pub async fn extract(&self, unit: &SourceUnit) -> Result<ExtractedText, ExtractionFailure> {
        let raw_text = match &unit.origin {
            SourceOrigin::Url(url) => self.extract_url(url).await?,
            SourceOrigin::Upload { bytes, .. } => decode_upload(bytes)?,
        };

        let text = truncate_chars(&normalize_whitespace(&raw_text), self.settings.max_extracted_chars);
        let chars = text.chars().count();
        if chars < self.settings.min_extracted_chars {
            return Err(ExtractionFailure::TooShort { chars });
        }

        debug!(source = unit.identifier(), chars, "Extracted source text");
        Ok(ExtractedText {
            source_id: unit.identifier().to_string(),
            text,
        })
    }

    async fn extract_url(&self, url: &str) -> Result<String, ExtractionFailure> {
        let parsed = Url::parse(url).map_err(|e| ExtractionFailure::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ExtractionFailure::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                url,
                parsed.scheme()
            )));
        }

        let options = self.fetch_options();
        let page = tokio::time::timeout(options.timeout, self.fetcher.get(url, &options))
            .await
            .map_err(|_| FetchError::Timeout(options.timeout))??;

        let content_type = page.content_type.unwrap_or_default();
        if !is_html(&content_type) {
            let shown = if content_type.is_empty() { "unknown".to_string() } else { content_type };
            return Err(ExtractionFailure::NotHtml(shown));
        }

        Ok(extract_main_text(&page.body, self.settings.min_extracted_chars))
    }

    fn fetch_options(&self) -> FetchOptions {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), self.settings.user_agent.clone());
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml;q=0.9".to_string(),
        );
        FetchOptions {
            timeout: self.settings.fetch_timeout,
            max_bytes: self.settings.fetch_max_bytes,
            headers,
        }
    }
}

//=========================================================================================
// Text Helpers
//=========================================================================================

fn decode_upload(bytes: &[u8]) -> Result<String, ExtractionFailure> {
    let text = std::str::from_utf8(bytes).map_err(|_| ExtractionFailure::InvalidEncoding)?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    HTML_CONTENT_TYPES.contains(&mime.as_str())
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keeps at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_end, _)) => text[..byte_end].to_string(),
        None => text.to_string(),
    }
}

/// Extracts the readable text of the most plausible main-content region.
///
/// Selectors are tried in priority order; the first region holding at least
/// `min_chars` characters wins. Otherwise the whole body is used.
pub fn extract_main_text(html: &str, min_chars: usize) -> String {
    let document = Html::parse_document(html);

    for raw_selector in MAIN_CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(raw_selector) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = normalize_whitespace(&collect_text(element));
            if text.chars().count() >= min_chars {
                debug!(selector = raw_selector, "Selected main content region");
                return text;
            }
        }
    }

    let body = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
        .unwrap_or_else(|| document.root_element());
    normalize_whitespace(&collect_text(body))
}

fn collect_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    out
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if EXCLUDED_TAGS.contains(&name) {
                    continue;
                }
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                let is_block = BLOCK_TAGS.contains(&name);
                if is_block {
                    out.push(' ');
                }
                push_text(child_element, out);
                if is_block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILLER: &str = "This paragraph carries enough words to count as real article content for the extractor.";

    #[test]
    fn test_prefers_main_over_body() {
        let html = format!(
            "<html><body><div>Sidebar junk</div><main><p>{}</p></main></body></html>",
            FILLER
        );
        let text = extract_main_text(&html, 50);
        assert_eq!(text, FILLER);
    }

    #[test]
    fn test_article_is_used_when_main_missing() {
        let html = format!(
            "<html><body><p>Intro</p><article><h1>Title</h1><p>{}</p></article></body></html>",
            FILLER
        );
        let text = extract_main_text(&html, 50);
        assert_eq!(text, format!("Title {}", FILLER));
    }

    #[test]
    fn test_short_main_region_falls_through_to_body() {
        let html = format!(
            "<html><body><main>Tiny</main><div><p>{}</p></div></body></html>",
            FILLER
        );
        let text = extract_main_text(&html, 50);
        assert!(text.contains("Tiny"));
        assert!(text.contains(FILLER));
    }

    #[test]
    fn test_non_content_elements_are_removed() {
        let html = format!(
            r#"<html><head><title>T</title><style>body {{ color: red; }}</style></head>
            <body>
              <header>Site header</header>
              <nav>Home | About</nav>
              <script>var tracking = true;</script>
              <noscript>Enable JS</noscript>
              <aside>Related links</aside>
              <form><label>Email</label></form>
              <iframe src="x"></iframe>
              <p>{}</p>
              <footer>Copyright</footer>
            </body></html>"#,
            FILLER
        );
        let text = extract_main_text(&html, 50);
        assert_eq!(text, FILLER);
    }

    #[test]
    fn test_block_elements_separate_words() {
        let html = "<html><body><div><p>first</p><p>second</p></div><ul><li>a</li><li>b</li></ul></body></html>";
        assert_eq!(extract_main_text(html, 1000), "first second a b");
    }

    #[test]
    fn test_inline_elements_do_not_split_words() {
        let html = "<html><body><p>Hel<strong>lo</strong> world</p></body></html>";
        assert_eq!(extract_main_text(html, 1000), "Hello world");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\n b\t\tc  "), "a b c");
        assert_eq!(normalize_whitespace(" \n "), "");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("TEXT/HTML"));
        assert!(is_html("application/xhtml+xml"));
        assert!(!is_html("application/pdf"));
        assert!(!is_html("application/json"));
        assert!(!is_html(""));
    }

    #[test]
    fn test_decode_upload() {
        assert_eq!(decode_upload("\u{feff}hello".as_bytes()).unwrap(), "hello");
        assert!(matches!(
            decode_upload(&[0xff, 0xfe, 0x00]),
            Err(ExtractionFailure::InvalidEncoding)
        ));
    }
}
