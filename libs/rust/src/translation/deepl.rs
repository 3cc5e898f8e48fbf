//! Metered translation engine client (DeepL v2 API).
//!
//! Carries usage accounting and named-glossary support; requests are sent
//! with HTML tag handling so markup survives translation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::translation::glossary::Glossary;
use crate::translation::{TranslateBackend, TranslationUsage};

const API_BASE: &str = "https://api.deepl.com/v2";

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    character_count: u64,
    character_limit: u64,
}

#[derive(Debug, Deserialize)]
struct GlossaryInfo {
    glossary_id: String,
    name: String,
    source_lang: String,
    target_lang: String,
}

#[derive(Debug, Deserialize)]
struct GlossaryList {
    glossaries: Vec<GlossaryInfo>,
}

pub struct DeeplBackend {
    client: Client,
    api_key: String,
    api_base: String,
    glossary_id: Option<String>,
}

impl DeeplBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: API_BASE.to_string(),
            glossary_id: None,
        }
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }

    /// Create the named glossary for its language pair, or bind the one
    /// that already exists under the same name.
    pub async fn ensure_glossary(&mut self, glossary: &Glossary) -> AppResult<()> {
        if glossary.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(format!("{}/glossaries", self.api_base))
            .header("Authorization", self.auth_header())
            .form(&[
                ("name", glossary.name.as_str()),
                ("source_lang", glossary.source_lang.as_str()),
                ("target_lang", glossary.target_lang.as_str()),
                ("entries", glossary.to_tsv().as_str()),
                ("entries_format", "tsv"),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            let created: GlossaryInfo = response.json().await?;
            info!("Created glossary {:?} ({})", created.name, created.glossary_id);
            self.glossary_id = Some(created.glossary_id);
            return Ok(());
        }

        warn!(
            "Glossary creation returned {}, binding an existing glossary instead",
            response.status()
        );
        let list: GlossaryList = self
            .client
            .get(format!("{}/glossaries", self.api_base))
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let existing = list
            .glossaries
            .into_iter()
            .find(|g| {
                g.name == glossary.name
                    && g.source_lang.eq_ignore_ascii_case(&glossary.source_lang)
                    && g.target_lang.eq_ignore_ascii_case(&glossary.target_lang)
            })
            .ok_or_else(|| {
                AppError::Translation(format!(
                    "glossary {:?} neither creatable nor present",
                    glossary.name
                ))
            })?;

        info!("Bound existing glossary {:?} ({})", existing.name, existing.glossary_id);
        self.glossary_id = Some(existing.glossary_id);
        Ok(())
    }
}

#[async_trait]
impl TranslateBackend for DeeplBackend {
    fn name(&self) -> &'static str {
        "deepl"
    }

    async fn translate_chunk(
        &self,
        chunk: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> AppResult<String> {
        let target = target_lang.to_uppercase();
        let mut form: Vec<(&str, String)> = vec![
            ("text", chunk.to_string()),
            ("target_lang", target),
            ("tag_handling", "html".to_string()),
            ("preserve_formatting", "1".to_string()),
            ("formality", "prefer_more".to_string()),
        ];
        if let Some(source) = source_lang {
            form.push(("source_lang", source.to_uppercase()));
        }
        if let Some(glossary_id) = &self.glossary_id {
            form.push(("glossary_id", glossary_id.clone()));
        }

        let response = self
            .client
            .post(format!("{}/translate", self.api_base))
            .header("Authorization", self.auth_header())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Translation(format!(
                "translate request failed with {}: {}",
                status, body
            )));
        }

        let parsed: TranslateResponse = response.json().await?;
        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| AppError::Translation("empty translation response".to_string()))
    }

    async fn usage(&self) -> AppResult<TranslationUsage> {
        let usage: UsageResponse = self
            .client
            .get(format!("{}/usage", self.api_base))
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(TranslationUsage::Metered {
            used: usage.character_count,
            limit: usage.character_limit,
        })
    }
}
