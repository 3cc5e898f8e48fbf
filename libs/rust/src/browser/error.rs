//! Error module for headless browser operations

use chromiumoxide::error::CdpError;
use thiserror::Error;

/// Custom error type for headless browser operations
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser startup error: {0}")]
    StartupError(String),
    #[error("Tab creation error: {0}")]
    TabCreationError(String),
    #[error("Navigation error: {0}")]
    NavigationError(String),
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    #[error("Timeout error: {0}")]
    TimeoutError(String),
    #[error("Retry limit exceeded: {0}")]
    RetryLimitExceeded(String),
    #[error("Generic browser error: {0}")]
    GenericError(String),
    #[error(transparent)]
    Chromiumoxide(#[from] CdpError),
}

/// Result type for headless browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;
