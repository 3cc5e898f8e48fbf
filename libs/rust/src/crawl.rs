//! Chain crawling for sources whose chapter lists span multiple pages.
//!
//! One state machine per crawl: fetch a page, parse it, emit its chapters,
//! follow the next-page link. The visited set (seeded with the start URL)
//! and the chapter bound both terminate the loop; a repeated URL ends the
//! crawl quietly. Failures mid-chain are non-fatal: whatever was already
//! emitted is returned.

use std::collections::HashSet;
use std::future::Future;

use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::models::ChapterDescriptor;

/// Chapters discovered when no explicit bound is given.
pub const DEFAULT_MAX_CHAPTERS: usize = 50;
/// Hard ceiling on any discovery request.
pub const MAX_CHAPTERS_CAP: usize = 200;

/// Clamp a requested chapter bound into the supported range.
pub fn clamp_max(max: usize) -> usize {
    if max == 0 {
        DEFAULT_MAX_CHAPTERS
    } else {
        max.min(MAX_CHAPTERS_CAP)
    }
}

/// What parsing one page of a chain yields.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub chapters: Vec<ChapterDescriptor>,
    pub next: Option<String>,
}

/// Follow a chapter chain starting at `start_url`, visiting at most `max`
/// pages and emitting at most `max` chapters. `visit` fetches and parses a
/// single page.
pub async fn crawl_chain<F, Fut>(start_url: &str, max: usize, mut visit: F) -> Vec<ChapterDescriptor>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = AppResult<ParsedPage>>,
{
    let max = clamp_max(max);
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start_url.to_string());

    let mut chapters: Vec<ChapterDescriptor> = Vec::new();
    let mut url = start_url.to_string();
    let mut pages = 0_usize;

    loop {
        pages += 1;
        let page = match visit(url.clone()).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Stopping crawl at {} with partial results: {}", url, e);
                break;
            }
        };

        chapters.extend(page.chapters);
        if chapters.len() >= max {
            info!("Reached chapter limit ({}), stopping crawl", max);
            chapters.truncate(max);
            break;
        }
        if pages >= max {
            info!("Reached page limit ({}), stopping crawl", max);
            break;
        }

        match page.next {
            Some(next) if visited.contains(&next) => {
                debug!("Crawl cycle detected at {}, stopping", next);
                break;
            }
            Some(next) => {
                debug!("Following next chapter link: {}", next);
                visited.insert(next.clone());
                url = next;
            }
            None => break,
        }
    }

    chapters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;

    fn page(n: f64, next: Option<&str>) -> ParsedPage {
        ParsedPage {
            chapters: vec![ChapterDescriptor::new(
                n,
                format!("Capítulo {n}"),
                format!("https://paste.example/{n}"),
            )],
            next: next.map(String::from),
        }
    }

    async fn run(pages: HashMap<String, ParsedPage>, start: &str, max: usize) -> Vec<ChapterDescriptor> {
        crawl_chain(start, max, |url| {
            let result = pages
                .get(&url)
                .cloned()
                .ok_or_else(|| AppError::FetchHttp { url, status: 404 });
            async move { result }
        })
        .await
    }

    #[test]
    fn requested_bounds_are_clamped() {
        assert_eq!(clamp_max(0), DEFAULT_MAX_CHAPTERS);
        assert_eq!(clamp_max(30), 30);
        assert_eq!(clamp_max(1_000), MAX_CHAPTERS_CAP);
    }

    #[tokio::test]
    async fn follows_the_chain_up_to_max() {
        let mut pages = HashMap::new();
        pages.insert("a".to_string(), page(42.0, Some("b")));
        pages.insert("b".to_string(), page(43.0, Some("c")));
        pages.insert("c".to_string(), page(44.0, Some("d")));
        pages.insert("d".to_string(), page(45.0, None));

        let chapters = run(pages, "a", 3).await;
        assert_eq!(
            chapters.iter().map(|c| c.number).collect::<Vec<_>>(),
            vec![42.0, 43.0, 44.0]
        );
    }

    #[tokio::test]
    async fn a_cycle_terminates_the_crawl() {
        let mut pages = HashMap::new();
        pages.insert("a".to_string(), page(1.0, Some("b")));
        pages.insert("b".to_string(), page(2.0, Some("a")));

        let chapters = run(pages, "a", 50).await;
        assert_eq!(chapters.len(), 2);
    }

    #[tokio::test]
    async fn a_self_link_terminates_immediately() {
        let mut pages = HashMap::new();
        pages.insert("a".to_string(), page(1.0, Some("a")));

        let chapters = run(pages, "a", 50).await;
        assert_eq!(chapters.len(), 1);
    }

    #[tokio::test]
    async fn mid_chain_failure_returns_partial_results() {
        let mut pages = HashMap::new();
        pages.insert("a".to_string(), page(1.0, Some("b")));
        pages.insert("b".to_string(), page(2.0, Some("gone")));

        let chapters = run(pages, "a", 50).await;
        assert_eq!(chapters.len(), 2);
    }

    #[tokio::test]
    async fn never_visits_more_pages_than_max() {
        // Every page links to a fresh URL but contributes no chapters.
        let chapters = crawl_chain("p0", 5, |url| async move {
            let n: usize = url.trim_start_matches('p').parse().unwrap();
            Ok(ParsedPage {
                chapters: vec![],
                next: Some(format!("p{}", n + 1)),
            })
        })
        .await;
        assert!(chapters.is_empty());
    }
}
