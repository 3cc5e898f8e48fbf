//! Adapter for manhwaweb.com, a comic site with a lazy image grid.
//!
//! Everything is rendered: the chapter list hides behind a "Ver Todo"
//! control and more entries load on scroll; chapter pages lazy-load their
//! images the same way. Extraction happens on the settled DOM.

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
    ChapterDescriptor, ComicManifest, ContentEnvelope, ImageRef, Work, WorkKind, WorkMetadata,
    WorkStatus,
};
use crate::scrapers::{
    number_from_url, resolve_url, sort_and_dedupe, DiscoverOptions, Scraper, ScraperContext,
};
use crate::utils::html as dom;

const BASE_URL: &str = "https://manhwaweb.com";

const TITLE_SEL: &str = "h2.text-left.md\\:text-3xl.xs\\:text-2xl.mb-1.text-xl.font-normal";
const COVER_SEL: &str = "img.h-full.object-cover.aspect-lezhin";
const DESCRIPTION_SEL: &str = "div.sm\\:w-3\\/4 span";
const TAGS_SEL: &str = "div.sm\\:w-3\\/4 div.grid.grid-cols-1 a";
const AUTHOR_SEL: &str = "div.sm\\:w-3\\/4 div.flex.gap-2 > a";
const STATUS_SEL: &str = "div.sm\\:w-3\\/4 div.flex.items-center.gap-2 > div.text-base";
const CHAPTER_LIST_SEL: &str = "div.grid.grid-cols-1.md\\:border.border-y div.flex.p-2.gap-2.border-t";
const CHAPTER_TITLE_SEL: &str = "div.sm\\:text-lg.xs\\:text-base.text-sm";
const CHAPTER_LINK_SEL: &str = "a.text-gray-500";
const VIEW_ALL_SEL: &str = "button.ver_todo";
const IMAGE_CONTAINER_SEL: &str = "div.flex-col.justify-center.items-center";
const IMAGES_SEL: &str =
    "div.flex-col.justify-center.items-center div.flex.flex-col.items-center.w-full.md\\:max-w-3xl.m-auto img";

/// Substrings of ad and loader image URLs.
const AD_MARKERS: [&str; 3] = ["pubadx", "ads", "advertisement"];
const PLACEHOLDER_SUFFIX: &str = "loading.gif";

static CHAPTER_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Capitulo\s+(\d+(?:\.\d+)?)").unwrap());
static ANY_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());

pub struct ManhwawebScraper {
    ctx: Arc<ScraperContext>,
}

impl ManhwawebScraper {
    pub fn new(ctx: Arc<ScraperContext>) -> Self {
        Self { ctx }
    }

    fn extract_number(title: &str) -> Option<f64> {
        CHAPTER_NUMBER
            .captures(title)
            .or_else(|| ANY_NUMBER.captures(title))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }

    pub(crate) fn parse_info(html: &str, url: &str) -> WorkMetadata {
        let document = Html::parse_document(html);

        WorkMetadata {
            title: dom::select_text(&document, TITLE_SEL),
            author: dom::select_text(&document, AUTHOR_SEL),
            description: dom::select_text(&document, DESCRIPTION_SEL),
            cover_url: dom::select_attr(&document, COVER_SEL, "src"),
            status: dom::select_text(&document, STATUS_SEL)
                .map(|s| WorkStatus::from_site_text(&s)),
            tags: dom::select_all(&document, TAGS_SEL)
                .iter()
                .map(dom::text)
                .filter(|t| !t.is_empty())
                .collect(),
            kind: WorkKind::Comic,
            source_name: "manhwaweb".to_string(),
            source_url: url.to_string(),
        }
    }

    pub(crate) fn parse_chapter_list(html: &str, page_url: &str) -> Vec<ChapterDescriptor> {
        let document = Html::parse_document(html);
        let mut chapters = Vec::new();

        for element in dom::select_all(&document, CHAPTER_LIST_SEL) {
            let Some(title) = dom::select_text_el(&element, CHAPTER_TITLE_SEL) else {
                continue;
            };
            let Some(href) = dom::select_attr_el(&element, CHAPTER_LINK_SEL, "href") else {
                continue;
            };
            let Some(url) = resolve_url(page_url, &href) else {
                continue;
            };

            let number = Self::extract_number(&title)
                .or_else(|| number_from_url(&url))
                .unwrap_or((chapters.len() + 1) as f64);

            chapters.push(
                ChapterDescriptor::new(number, title.clone(), url).with_chapter_title(title),
            );
        }

        sort_and_dedupe(&mut chapters);
        chapters
    }

    /// Pull every image under the reader container, in DOM order, dropping
    /// ads, the lazy-load placeholder and 1px trackers. Ordinals are
    /// assigned after filtering, 1..N.
    pub(crate) fn parse_images(html: &str) -> Vec<ImageRef> {
        let document = Html::parse_document(html);
        let mut images = Vec::new();

        for element in dom::select_all(&document, IMAGES_SEL) {
            let Some(src) = element.value().attr("src").map(str::trim) else {
                continue;
            };
            if src.is_empty()
                || AD_MARKERS.iter().any(|marker| src.contains(marker))
                || src.ends_with(PLACEHOLDER_SUFFIX)
            {
                continue;
            }

            let width = element.value().attr("width").map(String::from);
            let height = element.value().attr("height").map(String::from);
            if let (Some(w), Some(h)) = (
                width.as_deref().and_then(|w| w.parse::<i64>().ok()),
                height.as_deref().and_then(|h| h.parse::<i64>().ok()),
            ) {
                if w <= 1 || h <= 1 {
                    continue;
                }
            }

            let url = if src.starts_with("http") {
                src.to_string()
            } else {
                resolve_url(BASE_URL, src).unwrap_or_else(|| src.to_string())
            };

            images.push(ImageRef {
                url,
                alt: element.value().attr("alt").unwrap_or("").to_string(),
                width,
                height,
                index: images.len() + 1,
                local_path: None,
            });
        }

        images
    }

    async fn info_inner(&self, fetcher: &Fetcher, url: &str) -> AppResult<WorkMetadata> {
        let tab = fetcher.tab(url).await?;
        tab.wait_for_element(TITLE_SEL).await?;
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
        tab.wait_for_element(CHAPTER_LIST_SEL).await?;

        if let Err(e) = tab.click(VIEW_ALL_SEL, Duration::from_secs(2)).await {
            warn!("Could not click the \"Ver Todo\" control: {}", e);
        }
        tab.scroll_to_bottom(Duration::from_millis(500)).await?;

        let html = tab.content().await?;
        let mut chapters = Self::parse_chapter_list(&html, url);
        chapters.truncate(crate::crawl::clamp_max(opts.max));
        Ok(chapters)
    }

    async fn images_inner(&self, fetcher: &Fetcher, url: &str) -> AppResult<Vec<ImageRef>> {
        let tab = fetcher.tab(url).await?;
        tab.wait_for_element(IMAGE_CONTAINER_SEL).await?;
        tab.scroll_to_bottom(Duration::from_millis(500)).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
        let html = tab.content().await?;
        Ok(Self::parse_images(&html))
    }
}

#[async_trait]
impl Scraper for ManhwawebScraper {
    fn name(&self) -> &str {
        "manhwaweb"
    }

    fn kind(&self) -> WorkKind {
        WorkKind::Comic
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
        let language = work.source_language();
        if let Some(cached) = self.ctx.store.get_comic(work, number, language).await? {
            debug!("Serving comic chapter {} from the content store", number);
            return Ok(ContentEnvelope::Comic(cached));
        }

        let fetcher = self.ctx.fetcher()?;
        let result = self.images_inner(&fetcher, url).await;
        fetcher.close().await;
        let images = result?;

        let manifest = ComicManifest::new(images);
        let stored = self
            .ctx
            .store
            .put_comic(work, number, language, &manifest)
            .await?;
        Ok(ContentEnvelope::Comic(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(images: &str) -> String {
        format!(
            r#"<html><body>
              <div class="flex-col justify-center items-center">
                <div class="flex flex-col items-center w-full md:max-w-3xl m-auto">{images}</div>
              </div>
            </body></html>"#
        )
    }

    #[test]
    fn image_grid_filters_ads_placeholders_and_trackers() {
        let mut tags = String::new();
        for i in 0..47 {
            tags.push_str(&format!(
                r#"<img src="https://cdn.example/page-{i}.jpg" width="800" height="1200">"#
            ));
        }
        tags.push_str(r#"<img src="https://ads.example/banner.png" width="300" height="50">"#);
        tags.push_str(r#"<img src="https://pubadx.example/x.gif" width="300" height="50">"#);
        tags.push_str(r#"<img src="https://cdn.example/loading.gif" width="100" height="100">"#);

        let images = ManhwawebScraper::parse_images(&grid(&tags));
        assert_eq!(images.len(), 47);
        assert_eq!(images[0].index, 1);
        assert_eq!(images[46].index, 47);
        assert!(images.iter().all(|img| img.url.starts_with("http")));
    }

    #[test]
    fn one_pixel_images_are_excluded() {
        let tags = concat!(
            r#"<img src="https://cdn.example/real.jpg" width="800" height="1200">"#,
            r#"<img src="https://cdn.example/tracker.gif" width="1" height="1">"#,
            r#"<img src="https://cdn.example/no-dims.jpg">"#,
        );
        let images = ManhwawebScraper::parse_images(&grid(tags));
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "https://cdn.example/real.jpg");
        assert_eq!(images[1].url, "https://cdn.example/no-dims.jpg");
    }

    #[test]
    fn relative_image_sources_resolve_against_the_site() {
        let tags = r#"<img src="/uploads/p1.webp" width="800" height="1200">"#;
        let images = ManhwawebScraper::parse_images(&grid(tags));
        assert_eq!(images[0].url, "https://manhwaweb.com/uploads/p1.webp");
    }

    #[test]
    fn chapter_list_parses_sorted_with_numbers() {
        let html = r#"<html><body>
          <div class="grid grid-cols-1 md:border border-y">
            <div class="flex p-2 gap-2 border-t">
              <div class="sm:text-lg xs:text-base text-sm">Capitulo 12</div>
              <a class="text-gray-500" href="/leer/solo-leveling-12"></a>
            </div>
            <div class="flex p-2 gap-2 border-t">
              <div class="sm:text-lg xs:text-base text-sm">Capitulo 2</div>
              <a class="text-gray-500" href="/leer/solo-leveling-2"></a>
            </div>
          </div>
        </body></html>"#;

        let chapters =
            ManhwawebScraper::parse_chapter_list(html, "https://manhwaweb.com/manhwa/solo-leveling");
        assert_eq!(
            chapters.iter().map(|c| c.number).collect::<Vec<_>>(),
            vec![2.0, 12.0]
        );
        assert_eq!(chapters[0].url, "https://manhwaweb.com/leer/solo-leveling-2");
    }

    #[test]
    fn status_text_maps_through_synonyms() {
        let html = r#"<html><body>
          <h2 class="text-left md:text-3xl xs:text-2xl mb-1 text-xl font-normal">Solo Leveling</h2>
          <div class="sm:w-3/4">
            <div class="flex items-center gap-2"><div class="text-base">PUBLICANDOSE</div></div>
          </div>
        </body></html>"#;
        let meta = ManhwawebScraper::parse_info(html, "https://manhwaweb.com/manhwa/solo-leveling");
        assert_eq!(meta.title.as_deref(), Some("Solo Leveling"));
        assert_eq!(meta.status, Some(WorkStatus::Ongoing));
        assert_eq!(meta.kind, WorkKind::Comic);
    }
}
