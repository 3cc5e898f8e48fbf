//! Headless browser wrapper
//!
//! A thin async wrapper over chromiumoxide used for rendered-mode fetching:
//! - One browser process per fetcher lifetime, one tab per fetch
//! - Retry and timeout discipline on every page operation
//! - Click and scroll-to-bottom primitives for reveal-all gestures

pub mod config;
pub mod error;
pub mod tab;

pub use config::BrowserConfig;
pub use error::{BrowserError, BrowserResult};
pub use tab::Tab;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;

/// A launched headless Chrome instance.
pub struct HeadlessBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    config: BrowserConfig,
}

impl HeadlessBrowser {
    /// Launch a browser process with the given configuration.
    pub async fn launch(config: BrowserConfig) -> BrowserResult<Self> {
        let mut builder = ChromiumConfig::builder();
        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }
        let chromium_config = builder.build().map_err(BrowserError::StartupError)?;

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|e| BrowserError::StartupError(e.to_string()))?;

        // The CDP event loop must be driven for the connection to stay alive.
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::info!("Launched headless browser");
        Ok(Self {
            browser,
            handler,
            config,
        })
    }

    /// Open a fresh tab for one fetch operation.
    pub async fn new_tab(&self) -> BrowserResult<Tab> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;
        Ok(Tab::new(page, self.config.clone()))
    }

    /// Shut the browser down, releasing the child process.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        tracing::debug!("Headless browser closed");
    }
}
