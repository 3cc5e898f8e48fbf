//! Adapter for skynovels.net, an Angular site whose chapter list lives in
//! collapsible volume panels.
//!
//! Discovery clicks the "Contenido" tab, the "Volumenes" control when
//! present, and then every expansion header before reading the list.
//! Chapter bodies are `markdown` rich-text blocks concatenated in document
//! order, with the site's ad widgets and inline loader scripts stripped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::fetcher::Fetcher;
use crate::models::{
    ChapterDescriptor, ContentEnvelope, Work, WorkKind, WorkMetadata, WorkStatus,
};
use crate::scrapers::{resolve_url, sort_and_dedupe, DiscoverOptions, Scraper, ScraperContext};
use crate::utils::html as dom;
use crate::utils::text::normalize_whitespace;

const TITLE_SEL: &str = "h1.skn-novel-presentation-info-title";
const COVER_SEL: &str = "div.skn-novel-presentation-image img";
const DESCRIPTION_SEL: &str = r#"meta[name="description"]"#;
const TAGS_SEL: &str = "div.skn-nvl-card-genres span.skn-secondary";
const AUTHOR_BLOCK_SEL: &str = "div.skn-text";
const STATUS_SEL: &str = "div.skn-secondary h4";
const INFO_SEL: &str = "div.skn-nvl-info";
const CHAPTER_LINKS_SEL: &str = "a.unstyled-a-tag.w-100.skn-link";
const CHAPTER_TITLE_SEL: &str = "div.skn-nvl-chp-element-title";
const CHAPTER_NUMBER_SEL: &str = "div.skn-nvl-chp-element-chp-number-index";
const CONTENT_SEL: &str = "div.skn-chp-chapter-content";

const CONTENT_TAB_JS: &str = r#"
    document.querySelectorAll('a.nav-link').forEach(a => {
        if (a.textContent.includes('Contenido')) { a.click(); }
    });
"#;
const VOLUMES_JS: &str = r#"
    document.querySelectorAll('button, a').forEach(el => {
        if (el.textContent.includes('Volumenes')) { el.click(); }
    });
"#;
const EXPAND_PANELS_JS: &str = r#"
    document.querySelectorAll(
        'mat-expansion-panel-header, div.accordion-header button, h2.accordion-header button'
    ).forEach(header => header.click());
"#;

static CHAPTER_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Capitulo\s+(\d+(?:\.\d+)?)").unwrap());
static ANY_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());
static URL_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"/capitulo[/-](\d+)").unwrap());
static UNWANTED: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Please support the translation team.*",
        r"(?i)Join our Discord for updates.*",
        r"(?i)Please read this chapter on our website.*",
        r"(?i)Visita skynovels\.net para.*",
        r"(?i)Si quieres leer más, visita.*",
        r"(?i)Todos los derechos reservados.*",
        r"(?i)Esta historia es propiedad de.*",
        r"(?s)\(?function\s*\(\s*w\s*,\s*q\s*\)\s*\{\s*w\s*\[\s*q\s*\]\s*=.*",
        r"_mgwidget",
        r"_mgq",
        r"_mgc\.load",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub struct SkynovelsScraper {
    ctx: Arc<ScraperContext>,
}

impl SkynovelsScraper {
    pub fn new(ctx: Arc<ScraperContext>) -> Self {
        Self { ctx }
    }

    pub(crate) fn parse_info(html: &str, url: &str) -> WorkMetadata {
        let document = Html::parse_document(html);

        let author = dom::select_all(&document, AUTHOR_BLOCK_SEL)
            .into_iter()
            .find(|el| dom::text(el).contains("Autor:"))
            .and_then(|el| dom::select_text_el(&el, "strong"));

        let status = dom::select_text(&document, STATUS_SEL).map(|text| {
            if text.to_lowercase().contains("finalizada") {
                WorkStatus::Completed
            } else {
                WorkStatus::Ongoing
            }
        });

        WorkMetadata {
            title: dom::select_text(&document, TITLE_SEL),
            author,
            description: dom::select_attr(&document, DESCRIPTION_SEL, "content"),
            cover_url: dom::select_attr(&document, COVER_SEL, "src"),
            status,
            tags: dom::select_all(&document, TAGS_SEL)
                .iter()
                .map(dom::text)
                .filter(|t| !t.is_empty())
                .collect(),
            kind: WorkKind::Novel,
            source_name: "skynovels".to_string(),
            source_url: url.to_string(),
        }
    }

    pub(crate) fn parse_chapter_links(html: &str, page_url: &str) -> Vec<ChapterDescriptor> {
        let document = Html::parse_document(html);
        let mut chapters = Vec::new();

        for link in dom::select_all(&document, CHAPTER_LINKS_SEL) {
            let title = dom::select_text_el(&link, CHAPTER_TITLE_SEL)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| dom::text(&link));
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve_url(page_url, href) else {
                continue;
            };

            let number = dom::select_text_el(&link, CHAPTER_NUMBER_SEL)
                .and_then(|n| n.trim().parse::<f64>().ok())
                .or_else(|| {
                    CHAPTER_NUMBER
                        .captures(&title)
                        .or_else(|| ANY_NUMBER.captures(&title))
                        .and_then(|caps| caps.get(1))
                        .and_then(|m| m.as_str().parse::<f64>().ok())
                })
                .or_else(|| {
                    URL_NUMBER
                        .captures(&url)
                        .and_then(|caps| caps.get(1))
                        .and_then(|m| m.as_str().parse::<f64>().ok())
                })
                .unwrap_or((chapters.len() + 1) as f64);

            chapters.push(
                ChapterDescriptor::new(number, title.clone(), url).with_chapter_title(title),
            );
        }

        sort_and_dedupe(&mut chapters);
        chapters
    }

    /// Concatenate the chapter's `markdown` blocks (or the whole container
    /// when none exist) and strip scripts, ad widgets and boilerplate.
    pub(crate) fn extract_chapter_html(html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let container = dom::selector(CONTENT_SEL)
            .and_then(|sel| document.select(&sel).next())?;

        let markdowns: Vec<String> = container
            .select(&dom::selector("markdown")?)
            .map(|el| el.inner_html())
            .collect();

        let combined = if markdowns.is_empty() {
            debug!("No markdown blocks found, using the whole chapter container");
            container.inner_html()
        } else {
            markdowns.concat()
        };

        let cleaned = dom::strip_script_blocks(&combined);
        let cleaned = dom::strip_prefixed_tags(&cleaned, "miad-");
        let cleaned = dom::apply_unwanted_patterns(&cleaned, &UNWANTED);
        let cleaned = dom::strip_attributes_except(&cleaned, &["img", "a"]);
        let cleaned = dom::remove_empty_elements(&cleaned);
        let cleaned = normalize_whitespace(&cleaned);

        Some(format!("<div>{}</div>", cleaned))
    }

    async fn info_inner(&self, fetcher: &Fetcher, url: &str) -> AppResult<WorkMetadata> {
        let tab = fetcher.tab(url).await?;
        if let Err(e) = tab.wait_for_element("div.skn-novel-presentation").await {
            warn!("Novel presentation block never appeared: {}", e);
        }
        let html = tab.content().await?;
        Ok(Self::parse_info(&html, url))
    }

    async fn chapters_inner(
        &self,
        fetcher: &Fetcher,
        url: &str,
        opts: &DiscoverOptions,
    ) -> AppResult<Vec<ChapterDescriptor>> {
        let tab = fetcher.tab(url).await?;
        if let Err(e) = tab.wait_for_element(INFO_SEL).await {
            warn!("Chapter info block never appeared: {}", e);
        }

        tab.evaluate(CONTENT_TAB_JS).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
        tab.evaluate(VOLUMES_JS).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
        tab.evaluate(EXPAND_PANELS_JS).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
        tab.scroll_to_bottom(Duration::from_millis(500)).await?;

        let html = tab.content().await?;
        let mut chapters = Self::parse_chapter_links(&html, url);
        chapters.truncate(crate::crawl::clamp_max(opts.max));
        Ok(chapters)
    }

    async fn content_inner(&self, fetcher: &Fetcher, url: &str) -> AppResult<Option<String>> {
        let tab = fetcher.tab(url).await?;
        if let Err(e) = tab.wait_for_element(CONTENT_SEL).await {
            warn!("Chapter container never appeared: {}", e);
        }
        let html = tab.content().await?;
        Ok(Self::extract_chapter_html(&html))
    }
}

#[async_trait]
impl Scraper for SkynovelsScraper {
    fn name(&self) -> &str {
        "skynovels"
    }

    fn kind(&self) -> WorkKind {
        WorkKind::Novel
    }

    async fn work_info(&self, url: &str) -> AppResult<WorkMetadata> {
        let fetcher = self.ctx.fetcher()?;
        let result = self.info_inner(&fetcher, url).await;
        fetcher.close().await;
        result
    }

    async fn chapters(
        &self,
        url: &str,
        opts: &DiscoverOptions,
    ) -> AppResult<Vec<ChapterDescriptor>> {
        let fetcher = self.ctx.fetcher()?;
        let result = self.chapters_inner(&fetcher, url, opts).await;
        fetcher.close().await;
        result
    }

    async fn chapter_content(
        &self,
        url: &str,
        work: &Work,
        number: f64,
    ) -> AppResult<ContentEnvelope> {
        let language = work.source_language.as_deref().unwrap_or("es");
        if let Some(cached) = self.ctx.store.get_text(work, number, language).await? {
            debug!("Serving chapter {} from the content store", number);
            return Ok(ContentEnvelope::text(cached));
        }

        let fetcher = self.ctx.fetcher()?;
        let result = self.content_inner(&fetcher, url).await;
        fetcher.close().await;

        let body = result?.unwrap_or_default();
        if body.is_empty() {
            warn!("Chapter container missing at {}", url);
            return Ok(ContentEnvelope::text(String::new()));
        }

        self.ctx.store.put_text(work, number, language, &body).await?;
        Ok(ContentEnvelope::text(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_links_prefer_the_numeric_index_element() {
        let html = r#"<html><body><div class="skn-nvl-info">
          <a class="unstyled-a-tag w-100 skn-link" href="/novelas/lotm/capitulo/3">
            <div class="skn-nvl-chp-element-chp-number-index">3</div>
            <div class="skn-nvl-chp-element-title">Su Humilde Servidor II</div>
          </a>
          <a class="unstyled-a-tag w-100 skn-link" href="/novelas/lotm/capitulo/1">
            <div class="skn-nvl-chp-element-title">Capitulo 1: Carmesí</div>
          </a>
          <a class="unstyled-a-tag w-100 skn-link" href="/novelas/lotm/capitulo-2">
            <div class="skn-nvl-chp-element-title">Prólogo verdadero</div>
          </a>
        </div></body></html>"#;

        let chapters =
            SkynovelsScraper::parse_chapter_links(html, "https://skynovels.net/novelas/lotm");
        assert_eq!(
            chapters.iter().map(|c| c.number).collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(
            chapters[2].chapter_title.as_deref(),
            Some("Su Humilde Servidor II")
        );
        assert_eq!(
            chapters[0].url,
            "https://skynovels.net/novelas/lotm/capitulo/1"
        );
    }

    #[test]
    fn chapter_body_concatenates_markdown_blocks() {
        let html = r#"<html><body><div class="skn-chp-chapter-content">
          <markdown><p><strong>Capitulo 8</strong></p><p>Primera parte.</p></markdown>
          <miad-block1><div>publicidad</div></miad-block1>
          <markdown><p>Segunda parte.</p><script>var _mgwidget = 1;</script></markdown>
        </div></body></html>"#;

        let body = SkynovelsScraper::extract_chapter_html(html).unwrap();
        assert!(body.contains("Primera parte."));
        assert!(body.contains("Segunda parte."));
        assert!(!body.contains("publicidad"));
        assert!(!body.contains("_mgwidget"));
        assert!(!body.contains("<script"));
    }

    #[test]
    fn missing_container_yields_none() {
        assert_eq!(
            SkynovelsScraper::extract_chapter_html("<html><body><p>x</p></body></html>"),
            None
        );
    }

    #[test]
    fn info_reads_author_block_and_status() {
        let html = r#"<html><body>
          <div class="skn-novel-presentation">
            <h1 class="skn-novel-presentation-info-title">Lord of the Mysteries</h1>
            <div class="skn-novel-presentation-image"><img src="/covers/lotm.jpg"></div>
          </div>
          <div class="skn-text">Autor: <strong>Cuttlefish</strong></div>
          <div class="skn-secondary"><h4>Novela finalizada</h4></div>
          <div class="skn-nvl-card-genres">
            <span class="skn-secondary">Misterio</span>
            <span class="skn-secondary">Fantasía</span>
          </div>
        </body></html>"#;

        let meta = SkynovelsScraper::parse_info(html, "https://skynovels.net/novelas/lotm");
        assert_eq!(meta.title.as_deref(), Some("Lord of the Mysteries"));
        assert_eq!(meta.author.as_deref(), Some("Cuttlefish"));
        assert_eq!(meta.status, Some(WorkStatus::Completed));
        assert_eq!(meta.tags, vec!["Misterio", "Fantasía"]);
    }
}
