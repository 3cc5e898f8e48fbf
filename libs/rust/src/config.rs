//! Environment-backed runtime settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Which translation engine to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorBackend {
    /// Metered engine with usage accounting and glossary support.
    Paid,
    /// Free web endpoint; no usage signal, no engine glossary.
    Free,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub store_root: PathBuf,
    pub translator_backend: TranslatorBackend,
    pub deepl_api_key: Option<String>,
    pub target_language: String,
    pub fetch_timeout: Duration,
    pub fetch_retries: u32,
}

impl Settings {
    /// Read settings from the environment (and a `.env` file if present).
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let backend = match std::env::var("TRANSLATOR_BACKEND").as_deref() {
            Ok("paid") => TranslatorBackend::Paid,
            Ok("free") | Err(_) => TranslatorBackend::Free,
            Ok(other) => {
                return Err(AppError::Config(format!(
                    "unknown TRANSLATOR_BACKEND {:?} (expected \"paid\" or \"free\")",
                    other
                )))
            }
        };

        let deepl_api_key = std::env::var("DEEPL_API_KEY").ok().filter(|k| !k.is_empty());
        if backend == TranslatorBackend::Paid && deepl_api_key.is_none() {
            return Err(AppError::Config(
                "TRANSLATOR_BACKEND=paid requires DEEPL_API_KEY".to_string(),
            ));
        }

        let timeout_secs = std::env::var("FETCHER_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);
        let retries = std::env::var("FETCHER_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        Ok(Self {
            store_root: std::env::var("STORE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./storage")),
            translator_backend: backend,
            deepl_api_key,
            target_language: std::env::var("TRANSLATOR_TARGET_LANGUAGE")
                .unwrap_or_else(|_| "ES".to_string()),
            fetch_timeout: Duration::from_secs(timeout_secs),
            fetch_retries: retries,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("./storage"),
            translator_backend: TranslatorBackend::Free,
            deepl_api_key: None,
            target_language: "ES".to_string(),
            fetch_timeout: Duration::from_secs(10),
            fetch_retries: 3,
        }
    }
}
