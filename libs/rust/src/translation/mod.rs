//! HTML-preserving translation with pinned terminology.
//!
//! Two interchangeable engines sit behind [`TranslateBackend`]: a metered
//! one with usage accounting and glossary support, and a free one with
//! neither. Selection happens at construction time; the contract is
//! identical. Chunks of a single request are translated serially; a failed
//! chunk falls back to its original text and the request continues.

pub mod chunk;
pub mod deepl;
pub mod glossary;
pub mod google;

pub use chunk::{split_html_chunks, MAX_CHUNK_CHARS};
pub use deepl::DeeplBackend;
pub use glossary::{Glossary, SHADOW_SLAVE_TERMS};
pub use google::GoogleFreeBackend;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{Settings, TranslatorBackend};
use crate::error::{AppError, AppResult};

/// Character accounting for a metered engine, when the engine reports one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TranslationUsage {
    Metered { used: u64, limit: u64 },
    Unsupported,
}

impl TranslationUsage {
    pub fn percent(&self) -> Option<f64> {
        match self {
            TranslationUsage::Metered { used, limit } if *limit > 0 => {
                Some(*used as f64 / *limit as f64 * 100.0)
            }
            _ => None,
        }
    }

    pub fn exhausted(&self) -> bool {
        matches!(self, TranslationUsage::Metered { used, limit } if used >= limit)
    }
}

/// One translation engine.
#[async_trait]
pub trait TranslateBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Translate one chunk, preserving its markup.
    async fn translate_chunk(
        &self,
        chunk: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> AppResult<String>;

    async fn usage(&self) -> AppResult<TranslationUsage>;
}

/// The translation subsystem: chunking, quota checks, glossary binding.
pub struct Translator {
    backend: Box<dyn TranslateBackend>,
    glossary: Option<Glossary>,
}

impl Translator {
    pub fn new(backend: Box<dyn TranslateBackend>, glossary: Option<Glossary>) -> Self {
        Self { backend, glossary }
    }

    /// Build the configured backend and bind the shipped glossary when the
    /// engine supports one.
    pub async fn from_settings(settings: &Settings) -> AppResult<Self> {
        let glossary = Glossary::shadow_slave();
        match settings.translator_backend {
            TranslatorBackend::Paid => {
                let api_key = settings.deepl_api_key.clone().ok_or_else(|| {
                    AppError::Config("paid translator selected without an API key".to_string())
                })?;
                let mut backend = DeeplBackend::new(api_key);
                backend.ensure_glossary(&glossary).await?;
                Ok(Self::new(Box::new(backend), Some(glossary)))
            }
            TranslatorBackend::Free => Ok(Self::new(Box::new(GoogleFreeBackend::new()), None)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn glossary(&self) -> Option<&Glossary> {
        self.glossary.as_ref()
    }

    pub async fn usage(&self) -> AppResult<TranslationUsage> {
        self.backend.usage().await
    }

    /// Translate an HTML fragment. Refuses to start when the engine's
    /// character quota is already spent; a chunk that fails mid-way keeps
    /// its original text.
    pub async fn translate_html(
        &self,
        html: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> AppResult<String> {
        if let TranslationUsage::Metered { used, limit } = self.backend.usage().await? {
            if used >= limit {
                return Err(AppError::TranslationQuotaExceeded { used, limit });
            }
        }

        let chunks = split_html_chunks(html, MAX_CHUNK_CHARS);
        debug!(
            "Translating {} chunk(s) with {}",
            chunks.len(),
            self.backend.name()
        );

        let mut translated = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match self
                .backend
                .translate_chunk(&chunk, source_lang, target_lang)
                .await
            {
                Ok(text) => translated.push(text),
                Err(e) => {
                    warn!("Error translating chunk, keeping original: {}", e);
                    translated.push(chunk);
                }
            }
        }

        Ok(translated.join("\n"))
    }
}
