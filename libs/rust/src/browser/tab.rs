//! Tab operations with retry and timeout mechanisms

use crate::browser::{
    config::BrowserConfig,
    error::{BrowserError, BrowserResult},
};
use chromiumoxide::Page;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

/// A single page tab scoped to one pipeline operation.
pub struct Tab {
    page: Page,
    config: BrowserConfig,
}

impl Tab {
    pub(crate) fn new(page: Page, config: BrowserConfig) -> Self {
        Self { page, config }
    }

    /// Navigate to a URL and wait for the page to settle.
    pub async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.retry_operation(|| Box::pin(self.goto_once(url)), "navigation")
            .await?;
        self.settle().await
    }

    async fn goto_once(&self, url: &str) -> BrowserResult<()> {
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match timeout(self.config.default_timeout, navigation).await {
            Ok(result) => {
                result.map_err(|e| BrowserError::NavigationError(e.to_string()))?;
                tracing::debug!("Navigated to: {}", url);
                Ok(())
            }
            Err(_) => Err(BrowserError::TimeoutError(format!(
                "Navigation timeout for: {}",
                url
            ))),
        }
    }

    /// Wait until the DOM is ready and network activity has been quiet for
    /// the configured idle window, then pause a fixed cushion for late JS.
    async fn settle(&self) -> BrowserResult<()> {
        let deadline = Instant::now() + self.config.default_timeout;

        loop {
            let state = self
                .evaluate_once("document.readyState")
                .await
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            if state == "interactive" || state == "complete" {
                break;
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::TimeoutError(
                    "page never reached a ready state".to_string(),
                ));
            }
            sleep(Duration::from_millis(100)).await;
        }

        // Network idle: the resource entry count must hold still for one window.
        let mut last_count = -1_i64;
        loop {
            let count = self
                .evaluate_once("performance.getEntriesByType('resource').length")
                .await
                .ok()
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            if count == last_count || Instant::now() >= deadline {
                break;
            }
            last_count = count;
            sleep(self.config.network_idle_window).await;
        }

        sleep(self.config.settle_cushion).await;
        Ok(())
    }

    /// Wait for an element with retry and timeout
    pub async fn wait_for_element(&self, selector: &str) -> BrowserResult<()> {
        self.retry_operation(
            || Box::pin(self.wait_for_element_once(selector)),
            &format!("wait for element: {}", selector),
        )
        .await
    }

    async fn wait_for_element_once(&self, selector: &str) -> BrowserResult<()> {
        match timeout(self.config.default_timeout, self.page.find_element(selector)).await {
            Ok(result) => {
                result.map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
                tracing::debug!("Element found: {}", selector);
                Ok(())
            }
            Err(_) => Err(BrowserError::TimeoutError(format!(
                "Element wait timeout: {}",
                selector
            ))),
        }
    }

    /// Click the first element matching `selector`, then pause `post_delay`.
    pub async fn click(&self, selector: &str, post_delay: Duration) -> BrowserResult<()> {
        self.wait_for_element(selector).await?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::GenericError(e.to_string()))?;
        tracing::debug!("Clicked: {}", selector);
        if !post_delay.is_zero() {
            sleep(post_delay).await;
        }
        Ok(())
    }

    /// Scroll to the bottom of the page until its height stops growing.
    /// `idle_threshold` is the pause between growth checks.
    pub async fn scroll_to_bottom(&self, idle_threshold: Duration) -> BrowserResult<()> {
        let mut last_height = -1_i64;
        for _ in 0..40 {
            let height = self
                .evaluate_once(
                    "window.scrollTo(0, document.body.scrollHeight); document.body.scrollHeight",
                )
                .await?
                .as_i64()
                .unwrap_or(0);
            if height == last_height {
                break;
            }
            last_height = height;
            sleep(idle_threshold).await;
        }
        tracing::debug!("Scrolled to bottom (height {})", last_height);
        Ok(())
    }

    /// Get the serialized page DOM with retry
    pub async fn content(&self) -> BrowserResult<String> {
        self.retry_operation(|| Box::pin(self.content_once()), "get content")
            .await
    }

    async fn content_once(&self) -> BrowserResult<String> {
        match timeout(self.config.default_timeout, self.page.content()).await {
            Ok(result) => {
                let content = result.map_err(|e| BrowserError::GenericError(e.to_string()))?;
                tracing::debug!("Retrieved page content ({} chars)", content.len());
                Ok(content)
            }
            Err(_) => Err(BrowserError::TimeoutError(
                "Content retrieval timeout".to_string(),
            )),
        }
    }

    /// Execute JavaScript with retry
    pub async fn evaluate(&self, script: &str) -> BrowserResult<serde_json::Value> {
        self.retry_operation(|| Box::pin(self.evaluate_once(script)), "script evaluation")
            .await
    }

    async fn evaluate_once(&self, script: &str) -> BrowserResult<serde_json::Value> {
        match timeout(self.config.default_timeout, self.page.evaluate(script)).await {
            Ok(result) => {
                let value = result
                    .map_err(|e| BrowserError::GenericError(e.to_string()))?
                    .into_value()
                    .unwrap_or(serde_json::Value::Null);
                Ok(value)
            }
            Err(_) => Err(BrowserError::TimeoutError(format!(
                "Script execution timeout: {}",
                script
            ))),
        }
    }

    async fn retry_operation<F, Fut, T>(&self, operation: F, operation_name: &str) -> BrowserResult<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = BrowserResult<T>> + Send,
        T: Send + 'static,
    {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Operation '{}' succeeded on attempt {}",
                            operation_name,
                            attempt + 1
                        );
                    }
                    return Ok(result);
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries - 1 {
                        let delay = self.config.retry_delay * 2_u32.pow(attempt);
                        tracing::warn!(
                            "Operation '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                            operation_name,
                            attempt + 1,
                            self.config.max_retries,
                            delay,
                            last_error.as_ref().unwrap()
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(BrowserError::RetryLimitExceeded(format!(
            "Operation '{}' failed after {} attempts: {}",
            operation_name,
            self.config.max_retries,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        )))
    }
}

impl Drop for Tab {
    fn drop(&mut self) {
        // chromiumoxide tears pages down with the browser connection
        tracing::debug!("Tab dropped");
    }
}
