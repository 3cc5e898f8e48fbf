//! Source adapters: the capability contract plus the per-site
//! implementations and the registry that dispatches between them.

pub mod generic;
pub mod manhwaweb;
pub mod pastebin;
pub mod registry;
pub mod skynovels;

pub use registry::ScraperRegistry;

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Settings;
use crate::crawl::DEFAULT_MAX_CHAPTERS;
use crate::error::AppResult;
use crate::fetcher::Fetcher;
use crate::models::{ChapterDescriptor, ContentEnvelope, Work, WorkKind, WorkMetadata};
use crate::storage::ContentStore;

/// Bounds and mode for a discovery request.
#[derive(Debug, Clone, Copy)]
pub struct DiscoverOptions {
    /// Follow next-page links on sources that chain chapters.
    pub recursive: bool,
    /// Upper bound on discovered chapters (clamped by the crawl engine).
    pub max: usize,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            max: DEFAULT_MAX_CHAPTERS,
        }
    }
}

/// Shared resources handed to adapters at construction time.
pub struct ScraperContext {
    pub settings: Settings,
    pub store: Arc<ContentStore>,
}

impl ScraperContext {
    pub fn new(settings: Settings) -> Self {
        let store = Arc::new(ContentStore::new(settings.store_root.clone()));
        Self { settings, store }
    }

    /// A fetcher for one operation, with the process defaults.
    pub fn fetcher(&self) -> AppResult<Fetcher> {
        Fetcher::from_settings(&self.settings)
    }
}

/// The capability set every source adapter provides.
///
/// Adapters are stateless across calls; the fetcher (and any browser it
/// launches) lives only for the duration of a single operation. Content
/// materialization consults the content store before any network I/O.
#[async_trait]
pub trait Scraper: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> WorkKind;

    /// Scrape the work's landing page for catalog metadata.
    async fn work_info(&self, url: &str) -> AppResult<WorkMetadata>;

    /// Discover chapter descriptors, ordered ascending by number.
    async fn chapters(&self, url: &str, opts: &DiscoverOptions)
        -> AppResult<Vec<ChapterDescriptor>>;

    /// Materialize one chapter's content, store-first.
    async fn chapter_content(
        &self,
        url: &str,
        work: &Work,
        number: f64,
    ) -> AppResult<ContentEnvelope>;
}

impl std::fmt::Debug for dyn Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper").field("name", &self.name()).finish()
    }
}

/// Sort ascending by chapter number (stable, so discovery order breaks
/// ties) and drop descriptors whose URL repeats.
pub(crate) fn sort_and_dedupe(chapters: &mut Vec<ChapterDescriptor>) {
    chapters.sort_by(|a, b| a.number.total_cmp(&b.number));
    let mut seen = std::collections::HashSet::new();
    chapters.retain(|c| seen.insert(c.url.clone()));
}

static URL_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\D*$").unwrap());

/// Last digit run in a URL, the fallback when a title carries no number.
pub(crate) fn number_from_url(url: &str) -> Option<f64> {
    URL_DIGITS
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Resolve a possibly-relative href against the page it appeared on.
pub(crate) fn resolve_url(base: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    url::Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorting_is_stable_and_urls_are_unique() {
        let mut chapters = vec![
            ChapterDescriptor::new(2.0, "b", "https://x/2"),
            ChapterDescriptor::new(1.0, "a", "https://x/1"),
            ChapterDescriptor::new(1.5, "a.5", "https://x/1.5"),
            ChapterDescriptor::new(2.0, "b dup", "https://x/2"),
        ];
        sort_and_dedupe(&mut chapters);
        assert_eq!(
            chapters.iter().map(|c| c.number).collect::<Vec<_>>(),
            vec![1.0, 1.5, 2.0]
        );
        assert_eq!(chapters[2].title, "b");
    }

    #[test]
    fn url_numbers_tolerate_suffixes() {
        assert_eq!(number_from_url("https://x/capitulo-12"), Some(12.0));
        assert_eq!(number_from_url("https://x/chapter/12.5/"), Some(12.5));
        assert_eq!(
            number_from_url("https://x/chapter-9007199254740991"),
            Some(9007199254740991.0)
        );
        assert_eq!(number_from_url("https://x/prologue"), None);
    }

    #[test]
    fn hrefs_resolve_against_the_page() {
        assert_eq!(
            resolve_url("https://example.com/w/1", "/chapter/2").as_deref(),
            Some("https://example.com/chapter/2")
        );
        assert_eq!(
            resolve_url("https://example.com/w/1", "https://other.example/x").as_deref(),
            Some("https://other.example/x")
        );
    }
}
