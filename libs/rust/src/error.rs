use thiserror::Error;

use crate::browser::BrowserError;

/// Result type used across the pipeline.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("request timed out for {0}")]
    FetchTimeout(String),
    #[error("HTTP error {status} fetching {url}")]
    FetchHttp { url: String, status: u16 },
    #[error("network error fetching {url}: {message}")]
    FetchNetwork { url: String, message: String },
    #[error("browser rendering failed: {0}")]
    FetchRender(#[from] BrowserError),
    #[error("selector matched nothing: {0}")]
    SelectorMissing(String),
    #[error("could not parse a chapter number from {0:?}")]
    ChapterNumberUnparseable(String),
    #[error("no scraper available for source: {0}")]
    UnknownSource(String),
    #[error("translation quota exhausted: {used}/{limit} characters")]
    TranslationQuotaExceeded { used: u64, limit: u64 },
    #[error("translation backend error: {0}")]
    Translation(String),
    #[error("no chapters could be assembled into the bundle")]
    BundleEmpty,
    #[error("invalid chapter selection: {0}")]
    BundleSelectionInvalid(String),
    #[error("artifact not present in the content store")]
    StoreMissing,
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(s.to_string())
    }
}

impl AppError {
    /// Whether the fetcher may retry after this failure. Client-side HTTP
    /// errors are terminal; timeouts, network failures and 5xx retry.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::FetchTimeout(_) | AppError::FetchNetwork { .. } => true,
            AppError::FetchHttp { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
