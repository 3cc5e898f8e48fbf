use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::work::WorkKind;

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(
        "User-Agent".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
            .to_string(),
    );
    headers
}

/// A gesture some sites need before their full chapter list is visible:
/// click a control, wait, optionally scroll the page out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealAll {
    pub selector: String,
    #[serde(default)]
    pub wait_after_click_secs: u64,
    #[serde(default)]
    pub scroll_after_click: bool,
}

/// Named extraction patterns for a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePatterns {
    /// Captures the chapter number from a chapter title.
    pub chapter_number: Option<String>,
    /// Captures the URL of the next page in a chapter chain.
    pub next_link: Option<String>,
    /// Fragments removed from extracted content.
    #[serde(default)]
    pub unwanted_text: Vec<String>,
}

/// Everything the generic adapter needs to scrape one site.
///
/// Persisted by the source-configuration collaborator; consumed at
/// adapter construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub base_url: String,
    #[serde(rename = "content_type")]
    pub kind: WorkKind,
    #[serde(default)]
    pub selectors: HashMap<String, String>,
    #[serde(default)]
    pub patterns: SourcePatterns,
    #[serde(default)]
    pub use_rendered: bool,
    #[serde(default = "default_headers")]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub reveal_all: Option<RevealAll>,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, kind: WorkKind) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            kind,
            selectors: HashMap::new(),
            patterns: SourcePatterns {
                chapter_number: Some(r"Chapter\s+(\d+(?:\.\d+)?)".to_string()),
                next_link: None,
                unwanted_text: vec![
                    r"Please\s+read\s+at\s+.*".to_string(),
                    r"Translator:.*".to_string(),
                    r"Editor:.*".to_string(),
                    r"Proofreader:.*".to_string(),
                ],
            },
            use_rendered: false,
            headers: default_headers(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            reveal_all: None,
        }
    }

    /// Look up a configured selector by name.
    pub fn selector(&self, key: &str) -> Option<&str> {
        self.selectors.get(key).map(String::as_str).filter(|s| !s.is_empty())
    }

    /// Look up a selector, falling back through alternates to a default.
    pub fn selector_or<'a>(&'a self, keys: &[&str], default: &'a str) -> &'a str {
        keys.iter().find_map(|k| self.selector(k)).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_fallback_chain() {
        let mut config = SourceConfig::new("example", "https://example.com", WorkKind::Novel);
        config
            .selectors
            .insert("chapter_item".to_string(), "li.ch".to_string());
        assert_eq!(
            config.selector_or(&["chapter_item", "chapter_link"], "a"),
            "li.ch"
        );
        assert_eq!(config.selector_or(&["chapter_link"], "a"), "a");
        config.selectors.insert("chapter_link".to_string(), String::new());
        assert_eq!(config.selector_or(&["chapter_link"], "a"), "a");
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = SourceConfig::new("example", "https://example.com", WorkKind::Comic);
        config.reveal_all = Some(RevealAll {
            selector: "button.ver_todo".to_string(),
            wait_after_click_secs: 2,
            scroll_after_click: true,
        });
        let json = serde_json::to_string(&config).unwrap();
        let back: SourceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
