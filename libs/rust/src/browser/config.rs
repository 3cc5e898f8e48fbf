//! Browser configuration

use std::time::Duration;

/// Browser configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Arguments to pass to Chrome
    pub chrome_args: Vec<String>,
    /// Default timeout for page operations
    pub default_timeout: Duration,
    /// Maximum number of retries for page operations
    pub max_retries: u32,
    /// Delay between retries (exponential backoff base)
    pub retry_delay: Duration,
    /// Window with no network activity required before a page counts as settled
    pub network_idle_window: Duration,
    /// Fixed cushion after settling, for late-running page scripts
    pub settle_cushion: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_args: vec![
                "--no-sandbox".to_string(),
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-setuid-sandbox".to_string(),
                "--disable-background-networking".to_string(),
                "--disable-default-apps".to_string(),
                "--disable-extensions".to_string(),
                "--disable-sync".to_string(),
                "--disable-translate".to_string(),
                "--hide-scrollbars".to_string(),
                "--metrics-recording-only".to_string(),
                "--mute-audio".to_string(),
                "--no-first-run".to_string(),
                "--disk-cache-size=1".to_string(),
                "--disable-cache".to_string(),
            ],
            default_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            network_idle_window: Duration::from_millis(500),
            settle_cushion: Duration::from_millis(500),
        }
    }
}
