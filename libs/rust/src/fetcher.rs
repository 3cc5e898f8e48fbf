//! Dual-mode page retrieval: plain HTTP or a rendered browser DOM.
//!
//! Retry and backoff live here and nowhere else; adapters never retry on
//! their own.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, warn};

use crate::browser::{BrowserConfig, HeadlessBrowser, Tab};
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::models::SourceConfig;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// At most this many requests are in flight at once per fetcher.
const MAX_CONNECTIONS: usize = 10;
/// Idle keep-alive connections retained per host.
const MAX_IDLE_PER_HOST: usize = 5;

/// How a page should be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Decoded response body over plain HTTP.
    Raw,
    /// Final DOM serialized after page scripts have settled.
    Rendered,
}

/// Rewrite known raw-dump URLs to their raw form (pastebin-style pages
/// serve HTML unless the `/raw/` segment is present).
pub fn to_raw_url(url: &str) -> String {
    if url.contains("pastebin.com") && !url.contains("/raw/") {
        if let Some(paste_id) = url
            .split("pastebin.com/")
            .nth(1)
            .filter(|id| !id.is_empty())
        {
            let raw = format!("https://pastebin.com/raw/{}", paste_id);
            debug!("Converting to raw URL: {}", raw);
            return raw;
        }
    }
    url.to_string()
}

/// Per-operation page fetcher. Holds one HTTP client and, once rendered
/// mode is first used, one browser instance for the rest of its lifetime.
pub struct Fetcher {
    client: Client,
    headers: HeaderMap,
    timeout: Duration,
    max_retries: u32,
    inflight: Semaphore,
    browser: OnceCell<HeadlessBrowser>,
    browser_config: BrowserConfig,
}

impl Fetcher {
    pub fn new(
        timeout: Duration,
        max_retries: u32,
        extra_headers: Option<&HashMap<String, String>>,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .redirect(Policy::limited(10))
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        if let Some(extra) = extra_headers {
            for (name, value) in extra {
                match (
                    HeaderName::try_from(name.as_str()),
                    HeaderValue::try_from(value.as_str()),
                ) {
                    (Ok(name), Ok(value)) => {
                        headers.insert(name, value);
                    }
                    _ => warn!("skipping invalid header {:?}", name),
                }
            }
        }

        Ok(Self {
            client,
            headers,
            timeout,
            max_retries,
            inflight: Semaphore::new(MAX_CONNECTIONS),
            browser: OnceCell::new(),
            browser_config: BrowserConfig::default(),
        })
    }

    /// Fetcher with the process-wide defaults.
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        Self::new(settings.fetch_timeout, settings.fetch_retries, None)
    }

    /// Fetcher honoring a source configuration's headers and limits.
    pub fn for_source(config: &SourceConfig) -> AppResult<Self> {
        Self::new(
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
            Some(&config.headers),
        )
    }

    /// Retrieve `url` in the requested mode.
    pub async fn fetch(&self, url: &str, mode: FetchMode) -> AppResult<String> {
        match mode {
            FetchMode::Raw => self.fetch_raw(url).await,
            FetchMode::Rendered => self.fetch_rendered(url).await,
        }
    }

    /// Plain HTTP fetch with raw-URL rewriting and linear backoff retries.
    pub async fn fetch_raw(&self, url: &str) -> AppResult<String> {
        let url = to_raw_url(url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match self.try_get(&url).await {
                Ok(body) => {
                    if attempt > 0 {
                        info!("Fetch of {} succeeded on attempt {}", url, attempt + 1);
                    }
                    return Ok(body);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = Duration::from_secs(1) * (attempt + 1);
                    warn!(
                        "Fetch of {} failed (attempt {}/{}), retrying in {:?}: {}",
                        url,
                        attempt + 1,
                        self.max_retries + 1,
                        delay,
                        e
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::FetchNetwork {
            url: url.clone(),
            message: "retries exhausted".to_string(),
        }))
    }

    async fn try_get(&self, url: &str) -> AppResult<String> {
        let _permit = self
            .inflight
            .acquire()
            .await
            .map_err(|e| AppError::Other(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        debug!("GET {} -> {}", url, status);
        if !status.is_success() {
            return Err(AppError::FetchHttp {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))
    }

    /// Serialized DOM after the page has settled. One fresh tab per call.
    pub async fn fetch_rendered(&self, url: &str) -> AppResult<String> {
        let tab = self.tab(url).await?;
        Ok(tab.content().await?)
    }

    /// Open a tab already navigated to `url`, for adapters that need to
    /// click or scroll before extraction.
    pub async fn tab(&self, url: &str) -> AppResult<Tab> {
        let browser = self
            .browser
            .get_or_try_init(|| HeadlessBrowser::launch(self.browser_config.clone()))
            .await?;
        let tab = browser.new_tab().await?;
        tab.goto(url).await?;
        Ok(tab)
    }

    /// Release the browser process, if one was launched.
    pub async fn close(self) {
        if let Some(browser) = self.browser.into_inner() {
            browser.close().await;
        }
    }
}

fn classify_reqwest_error(url: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::FetchTimeout(url.to_string())
    } else {
        AppError::FetchNetwork {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pastebin_urls_rewrite_to_raw_form() {
        assert_eq!(
            to_raw_url("https://pastebin.com/aGPf0xqr"),
            "https://pastebin.com/raw/aGPf0xqr"
        );
        assert_eq!(
            to_raw_url("https://pastebin.com/raw/aGPf0xqr"),
            "https://pastebin.com/raw/aGPf0xqr"
        );
        assert_eq!(
            to_raw_url("https://paste.example/abcd"),
            "https://paste.example/abcd"
        );
        assert_eq!(to_raw_url("https://pastebin.com/"), "https://pastebin.com/");
    }

    #[test]
    fn transport_errors_classify_for_retry() {
        assert!(AppError::FetchTimeout("u".into()).is_transient());
        assert!(AppError::FetchHttp {
            url: "u".into(),
            status: 502
        }
        .is_transient());
        assert!(!AppError::FetchHttp {
            url: "u".into(),
            status: 404
        }
        .is_transient());
        assert!(!AppError::UnknownSource("x".into()).is_transient());
    }
}
