//! Adapter for TBATE chapters published as raw pastebin-style text dumps.
//!
//! Each page is one chapter: the chapter number sits alone on the first
//! numeric line, the chapter title on the line after it. The dump's last
//! line links the next chapter's page; a date instead of a link marks the
//! end of the published run. Discovery follows that chain.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::crawl::{crawl_chain, ParsedPage};
use crate::error::AppResult;
use crate::models::{
    chapter_display_title, ChapterDescriptor, ContentEnvelope, Work, WorkKind, WorkMetadata,
    WorkStatus,
};
use crate::scrapers::{DiscoverOptions, Scraper, ScraperContext};
use crate::utils::text::{raw_text_to_paragraphs, truncate_chars};

/// Dumps beyond this size are cut before parsing.
const MAX_BODY_CHARS: usize = 500_000;

static NEXT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Capítulo\s+\d+:\s+(https?://\S+)\s*$").unwrap());
static DATE_SENTINEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Capítulo\s+\d+:\s+\d{2}/\d{2}/\d{4}\s*$").unwrap());
static URL_TAIL_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static UNWANTED: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Capítulo\s+\d+:\s+\d{2}/\d{2}/\d{4}.*",
        r"(?i)Please support the translation team.*",
        r"(?i)Join our Discord for updates.*",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub struct PastebinScraper {
    ctx: Arc<ScraperContext>,
}

impl PastebinScraper {
    pub fn new(ctx: Arc<ScraperContext>) -> Self {
        Self { ctx }
    }

    /// Parse one dump: the chapter it carries and the link to the next one.
    pub(crate) fn parse_page(content: &str, page_url: &str) -> ParsedPage {
        let content = truncate_chars(content, MAX_BODY_CHARS);

        let lines: Vec<&str> = content.lines().collect();
        let mut number: Option<f64> = None;
        let mut chapter_title: Option<String> = None;

        for (i, line) in lines.iter().enumerate() {
            let line = line.trim();
            if line.is_empty() || !line.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            number = line.parse::<f64>().ok();
            chapter_title = lines
                .get(i + 1)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            break;
        }

        let number = number.or_else(|| {
            debug!("No numeric line at the start, falling back to the URL tail");
            page_url
                .rsplit('/')
                .next()
                .and_then(|tail| URL_TAIL_DIGITS.find(tail))
                .and_then(|m| m.as_str().parse::<f64>().ok())
        });

        let chapters = match number {
            Some(n) => {
                let mut descriptor = ChapterDescriptor::new(n, chapter_display_title(n), page_url);
                descriptor.chapter_title = chapter_title;
                vec![descriptor]
            }
            None => {
                warn!("Could not parse a chapter number from {}", page_url);
                vec![]
            }
        };

        let next = NEXT_LINK
            .captures(content)
            .map(|caps| caps[1].to_string())
            .or_else(|| {
                if DATE_SENTINEL.is_match(content) {
                    debug!("Found date marker, end of available chapters");
                }
                None
            });

        ParsedPage { chapters, next }
    }
}

#[async_trait]
impl Scraper for PastebinScraper {
    fn name(&self) -> &str {
        "pastebin_tbate"
    }

    fn kind(&self) -> WorkKind {
        WorkKind::Novel
    }

    async fn work_info(&self, url: &str) -> AppResult<WorkMetadata> {
        // The dump pages carry no work metadata.
        Ok(WorkMetadata {
            title: Some("The Beginning After The End".to_string()),
            author: Some("TurtleMe".to_string()),
            description: Some(
                "The Beginning After The End is a fantasy novel series written by TurtleMe."
                    .to_string(),
            ),
            cover_url: None,
            status: Some(WorkStatus::Ongoing),
            tags: vec![
                "Fantasy".to_string(),
                "Action".to_string(),
                "Adventure".to_string(),
            ],
            kind: WorkKind::Novel,
            source_name: self.name().to_string(),
            source_url: url.to_string(),
        })
    }

    async fn chapters(
        &self,
        url: &str,
        opts: &DiscoverOptions,
    ) -> AppResult<Vec<ChapterDescriptor>> {
        let fetcher = Arc::new(self.ctx.fetcher()?);

        let chapters = if opts.recursive {
            crawl_chain(url, opts.max, |page_url| {
                let fetcher = fetcher.clone();
                async move {
                    let body = fetcher.fetch_raw(&page_url).await?;
                    Ok(Self::parse_page(&body, &page_url))
                }
            })
            .await
        } else {
            let body = fetcher.fetch_raw(url).await?;
            Self::parse_page(&body, url).chapters
        };

        Ok(chapters)
    }

    async fn chapter_content(
        &self,
        url: &str,
        work: &Work,
        number: f64,
    ) -> AppResult<ContentEnvelope> {
        let language = work.source_language();
        if let Some(cached) = self.ctx.store.get_text(work, number, language).await? {
            debug!("Serving chapter {} from the content store", number);
            return Ok(ContentEnvelope::text(cached));
        }

        let fetcher = self.ctx.fetcher()?;
        let body = fetcher.fetch_raw(url).await?;

        let mut text = truncate_chars(&body, MAX_BODY_CHARS).to_string();
        for pattern in UNWANTED.iter() {
            text = pattern.replace_all(&text, "").into_owned();
        }
        let cleaned = raw_text_to_paragraphs(&text);

        self.ctx.store.put_text(work, number, language, &cleaned).await?;
        Ok(ContentEnvelope::text(cleaned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_number_title_and_next_link() {
        let body = "42\nThe Hollow Gate\nSunny opened his eyes.\n\nCapítulo 43: https://paste.example/abcd";
        let page = PastebinScraper::parse_page(body, "https://paste.example/seed");

        assert_eq!(page.chapters.len(), 1);
        let chapter = &page.chapters[0];
        assert_eq!(chapter.number, 42.0);
        assert_eq!(chapter.title, "Capítulo 42");
        assert_eq!(chapter.chapter_title.as_deref(), Some("The Hollow Gate"));
        assert_eq!(chapter.url, "https://paste.example/seed");
        assert_eq!(page.next.as_deref(), Some("https://paste.example/abcd"));
    }

    #[test]
    fn a_date_line_ends_the_chain() {
        let body = "45\nLast One\nstory text\nCapítulo 45: 12/05/2025";
        let page = PastebinScraper::parse_page(body, "https://paste.example/last");
        assert_eq!(page.chapters[0].number, 45.0);
        assert_eq!(page.next, None);
    }

    #[test]
    fn missing_numeric_line_falls_back_to_the_url() {
        let body = "No number here\njust prose";
        let page = PastebinScraper::parse_page(body, "https://paste.example/chapter-507");
        assert_eq!(page.chapters[0].number, 507.0);
        assert_eq!(page.chapters[0].title, "Capítulo 507");
        assert_eq!(page.chapters[0].chapter_title, None);
    }

    #[test]
    fn unparseable_pages_emit_nothing() {
        let page = PastebinScraper::parse_page("prose only", "https://paste.example/abcd");
        assert!(page.chapters.is_empty());
        assert_eq!(page.next, None);
    }

    #[test]
    fn very_large_chapter_numbers_survive() {
        let body = "90071992547409\nBig One\ntext";
        let page = PastebinScraper::parse_page(body, "https://paste.example/x");
        assert_eq!(page.chapters[0].number, 90071992547409.0);
    }

    #[tokio::test]
    async fn crawl_chain_follows_three_pages() {
        use std::collections::HashMap;

        let mut pages: HashMap<&str, &str> = HashMap::new();
        pages.insert(
            "https://paste.example/a",
            "42\nThe Hollow Gate\nstory\nCapítulo 43: https://paste.example/b",
        );
        pages.insert(
            "https://paste.example/b",
            "43\nThe Second Gate\nstory\nCapítulo 44: https://paste.example/c",
        );
        pages.insert(
            "https://paste.example/c",
            "44\nThe Third Gate\nstory\nCapítulo 45: 12/05/2025",
        );

        let chapters = crawl_chain("https://paste.example/a", 3, |url| {
            let body = pages.get(url.as_str()).copied().unwrap_or("");
            async move { Ok(PastebinScraper::parse_page(body, &url)) }
        })
        .await;

        assert_eq!(
            chapters.iter().map(|c| c.number).collect::<Vec<_>>(),
            vec![42.0, 43.0, 44.0]
        );
    }
}
