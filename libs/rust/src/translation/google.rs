//! Free translation backend over the public web endpoint.
//!
//! No usage signal and no engine glossary. Markup survives because only
//! the text runs between tags are sent out; tags are stitched back
//! unchanged.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::translation::{TranslateBackend, TranslationUsage};

const ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

static TAG_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// A fragment is either markup (copied through) or text (translated).
#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Tag(&'a str),
    Text(&'a str),
}

fn split_segments(chunk: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for m in TAG_SPLIT.find_iter(chunk) {
        if m.start() > cursor {
            segments.push(Segment::Text(&chunk[cursor..m.start()]));
        }
        segments.push(Segment::Tag(m.as_str()));
        cursor = m.end();
    }
    if cursor < chunk.len() {
        segments.push(Segment::Text(&chunk[cursor..]));
    }
    segments
}

pub struct GoogleFreeBackend {
    client: Client,
}

impl GoogleFreeBackend {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn translate_text(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> AppResult<String> {
        let url = format!(
            "{}?client=gtx&sl={}&tl={}&dt=t&q={}",
            ENDPOINT,
            source_lang.map(|l| l.to_lowercase()).unwrap_or_else(|| "auto".to_string()),
            target_lang.to_lowercase(),
            urlencoding::encode(text)
        );

        let value: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let translated = value
            .get(0)
            .and_then(|rows| rows.as_array())
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get(0).and_then(|t| t.as_str()))
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Translation("unexpected response shape".to_string()))?;

        Ok(translated)
    }
}

impl Default for GoogleFreeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslateBackend for GoogleFreeBackend {
    fn name(&self) -> &'static str {
        "google-free"
    }

    async fn translate_chunk(
        &self,
        chunk: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> AppResult<String> {
        let mut out = String::with_capacity(chunk.len());

        for segment in split_segments(chunk) {
            match segment {
                Segment::Tag(tag) => out.push_str(tag),
                Segment::Text(text) if text.trim().is_empty() => out.push_str(text),
                Segment::Text(text) => {
                    match self.translate_text(text.trim(), source_lang, target_lang).await {
                        Ok(translated) => {
                            // Keep the surrounding whitespace of the source run.
                            let leading = &text[..text.len() - text.trim_start().len()];
                            let trailing = &text[text.trim_end().len()..];
                            out.push_str(leading);
                            out.push_str(&translated);
                            out.push_str(trailing);
                        }
                        Err(e) => {
                            warn!("Error translating text run, keeping original: {}", e);
                            out.push_str(text);
                        }
                    }
                }
            }
        }

        Ok(out)
    }

    async fn usage(&self) -> AppResult<TranslationUsage> {
        Ok(TranslationUsage::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_preserve_tag_structure() {
        let segments = split_segments("<p>Hello <b>world</b></p>");
        assert_eq!(
            segments,
            vec![
                Segment::Tag("<p>"),
                Segment::Text("Hello "),
                Segment::Tag("<b>"),
                Segment::Text("world"),
                Segment::Tag("</b>"),
                Segment::Tag("</p>"),
            ]
        );
    }

    #[test]
    fn plain_text_is_a_single_segment() {
        assert_eq!(split_segments("no markup"), vec![Segment::Text("no markup")]);
    }
}
