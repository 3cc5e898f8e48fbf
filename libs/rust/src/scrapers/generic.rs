//! Configuration-driven adapter.
//!
//! Any site describable by selectors, extraction patterns and an optional
//! reveal-all gesture runs through this adapter without code changes;
//! hand-written adapters exist only for sites with irreducible quirks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::fetcher::{FetchMode, Fetcher};
use crate::models::{
    ChapterDescriptor, ComicManifest, ContentEnvelope, ImageRef, SourceConfig, Work, WorkKind,
    WorkMetadata, WorkStatus,
};
use crate::scrapers::{
    number_from_url, resolve_url, sort_and_dedupe, DiscoverOptions, Scraper, ScraperContext,
};
use crate::utils::html as dom;
use crate::utils::text::normalize_whitespace;

static ANY_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());

pub struct GenericScraper {
    config: SourceConfig,
    chapter_number: Option<Regex>,
    unwanted: Vec<Regex>,
    ctx: Arc<ScraperContext>,
}

impl GenericScraper {
    pub fn new(config: SourceConfig, ctx: Arc<ScraperContext>) -> Self {
        let chapter_number = config
            .patterns
            .chapter_number
            .as_deref()
            .and_then(|p| match Regex::new(&format!("(?i){p}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Invalid chapter_number pattern for {:?}: {}", config.name, e);
                    None
                }
            });
        let unwanted = dom::compile_patterns(&config.patterns.unwanted_text);
        Self {
            config,
            chapter_number,
            unwanted,
            ctx,
        }
    }

    fn extract_number(&self, title: &str) -> Option<f64> {
        self.chapter_number
            .as_ref()
            .and_then(|re| re.captures(title))
            .or_else(|| ANY_NUMBER.captures(title))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }

    /// Fetch a page in the configured mode, performing the reveal-all
    /// gesture first when one is declared.
    async fn fetch_page(&self, fetcher: &Fetcher, url: &str) -> AppResult<String> {
        if !self.config.use_rendered {
            return fetcher.fetch(url, FetchMode::Raw).await;
        }

        let tab = fetcher.tab(url).await?;
        if let Some(gesture) = &self.config.reveal_all {
            let wait = Duration::from_secs(gesture.wait_after_click_secs);
            match tab.wait_for_element(&gesture.selector).await {
                Ok(()) => {
                    if let Err(e) = tab.click(&gesture.selector, wait).await {
                        warn!("Reveal-all click failed on {:?}: {}", gesture.selector, e);
                    }
                }
                Err(e) => warn!("Reveal-all control never appeared: {}", e),
            }
            if gesture.scroll_after_click {
                tab.scroll_to_bottom(Duration::from_millis(500)).await?;
            }
        }
        Ok(tab.content().await?)
    }

    pub(crate) fn parse_info(&self, html: &str, url: &str) -> WorkMetadata {
        let document = Html::parse_document(html);
        let sel = |keys: &[&str], default: &'static str| -> String {
            self.config.selector_or(keys, default).to_string()
        };

        WorkMetadata {
            title: dom::select_text(&document, &sel(&["title"], "h1")),
            author: dom::select_text(&document, &sel(&["author"], ".author")),
            description: dom::select_text(&document, &sel(&["description"], ".description")),
            cover_url: dom::select_attr(&document, &sel(&["cover_image"], ".cover img"), "src"),
            status: dom::select_text(&document, &sel(&["status"], ".status"))
                .map(|s| WorkStatus::from_site_text(&s)),
            tags: dom::select_all(&document, &sel(&["tags"], ".tags a"))
                .iter()
                .map(dom::text)
                .filter(|t| !t.is_empty())
                .collect(),
            kind: self.config.kind,
            source_name: self.config.name.clone(),
            source_url: url.to_string(),
        }
    }

    pub(crate) fn parse_chapters(&self, html: &str, page_url: &str) -> Vec<ChapterDescriptor> {
        let document = Html::parse_document(html);
        let container_sel = self
            .config
            .selector_or(&["chapter_container", "chapter_list"], ".chapter-list");
        let Some(container) = dom::selector(container_sel)
            .and_then(|sel| document.select(&sel).next())
        else {
            warn!(
                "Chapter list container {:?} not found for {:?}",
                container_sel, self.config.name
            );
            return vec![];
        };

        let item_sel = self.config.selector_or(&["chapter_item", "chapter_link"], "a");
        let Some(item_selector) = dom::selector(item_sel) else {
            return vec![];
        };

        let mut chapters = Vec::new();
        for item in container.select(&item_selector) {
            let title = match self.config.selector("chapter_title") {
                Some(sel) => dom::select_text_el(&item, sel),
                None => Some(dom::text(&item)),
            }
            .filter(|t| !t.is_empty());

            let href = match self.config.selector("chapter_url") {
                Some(sel) => dom::select_attr_el(&item, sel, "href"),
                None => item
                    .value()
                    .attr("href")
                    .map(String::from)
                    .or_else(|| dom::select_attr_el(&item, "a", "href")),
            };

            let (Some(title), Some(href)) = (title, href) else {
                continue;
            };
            let Some(url) = resolve_url(page_url, &href) else {
                debug!("Skipping unresolvable chapter link {:?}", href);
                continue;
            };

            let number = self
                .extract_number(&title)
                .or_else(|| number_from_url(&url))
                .unwrap_or((chapters.len() + 1) as f64);

            chapters.push(
                ChapterDescriptor::new(number, title.clone(), url).with_chapter_title(title),
            );
        }

        sort_and_dedupe(&mut chapters);
        chapters
    }

    /// Extract and clean the text body of a chapter page.
    pub(crate) fn parse_text_content(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let content_sel = self.config.selector_or(&["chapter_content"], ".chapter-content");
        let Some(container) = dom::selector(content_sel)
            .and_then(|sel| document.select(&sel).next())
        else {
            warn!(
                "Content container {:?} not found for {:?}",
                content_sel, self.config.name
            );
            return String::new();
        };

        let mut cleaned = container.inner_html();
        if let Some(unwanted_sel) = self.config.selector("unwanted_elements") {
            if let Some(sel) = dom::selector(unwanted_sel) {
                for unwanted in container.select(&sel) {
                    cleaned = cleaned.replace(&unwanted.html(), "");
                }
            }
        }
        let cleaned = dom::strip_script_blocks(&cleaned);
        let cleaned = normalize_whitespace(&cleaned);
        dom::apply_unwanted_patterns(&cleaned, &self.unwanted)
    }

    /// Extract the image manifest of a comic chapter page.
    pub(crate) fn parse_comic_content(&self, html: &str) -> Vec<ImageRef> {
        let document = Html::parse_document(html);
        let images_sel = self
            .config
            .selector_or(&["chapter_images"], ".chapter-content img");
        let mut images = Vec::new();

        for element in dom::select_all(&document, images_sel) {
            let Some(src) = element.value().attr("src").map(str::trim) else {
                continue;
            };
            if src.is_empty() {
                continue;
            }
            let url = resolve_url(&self.config.base_url, src).unwrap_or_else(|| src.to_string());
            images.push(ImageRef {
                url,
                alt: element.value().attr("alt").unwrap_or("").to_string(),
                width: element.value().attr("width").map(String::from),
                height: element.value().attr("height").map(String::from),
                index: images.len() + 1,
                local_path: None,
            });
        }

        images
    }
}

#[async_trait]
impl Scraper for GenericScraper {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> WorkKind {
        self.config.kind
    }

    async fn work_info(&self, url: &str) -> AppResult<WorkMetadata> {
        let fetcher = Fetcher::for_source(&self.config)?;
        let result = self.fetch_page(&fetcher, url).await;
        fetcher.close().await;
        Ok(self.parse_info(&result?, url))
    }

    async fn chapters(
        &self,
        url: &str,
        opts: &DiscoverOptions,
    ) -> AppResult<Vec<ChapterDescriptor>> {
        let fetcher = Fetcher::for_source(&self.config)?;
        let result = self.fetch_page(&fetcher, url).await;
        fetcher.close().await;

        let mut chapters = self.parse_chapters(&result?, url);
        chapters.truncate(crate::crawl::clamp_max(opts.max));
        Ok(chapters)
    }

    async fn chapter_content(
        &self,
        url: &str,
        work: &Work,
        number: f64,
    ) -> AppResult<ContentEnvelope> {
        let language = work.source_language();

        match self.config.kind {
            WorkKind::Novel => {
                if let Some(cached) = self.ctx.store.get_text(work, number, language).await? {
                    debug!("Serving chapter {} from the content store", number);
                    return Ok(ContentEnvelope::text(cached));
                }

                let fetcher = Fetcher::for_source(&self.config)?;
                let result = self.fetch_page(&fetcher, url).await;
                fetcher.close().await;

                let body = self.parse_text_content(&result?);
                self.ctx.store.put_text(work, number, language, &body).await?;
                Ok(ContentEnvelope::text(body))
            }
            WorkKind::Comic => {
                if let Some(cached) = self.ctx.store.get_comic(work, number, language).await? {
                    debug!("Serving comic chapter {} from the content store", number);
                    return Ok(ContentEnvelope::Comic(cached));
                }

                let fetcher = Fetcher::for_source(&self.config)?;
                let result = self.fetch_page(&fetcher, url).await;
                fetcher.close().await;

                let manifest = ComicManifest::new(self.parse_comic_content(&result?));
                let stored = self
                    .ctx
                    .store
                    .put_comic(work, number, language, &manifest)
                    .await?;
                Ok(ContentEnvelope::Comic(stored))
            }
        }
    }
}
