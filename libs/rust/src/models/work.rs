use serde::{Deserialize, Serialize};

/// What a serialized publication contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Novel,
    Comic,
}

/// Publication status as reported by the source site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Ongoing,
    Completed,
    Unknown,
}

impl WorkStatus {
    /// Map a site's status label through known synonyms.
    pub fn from_site_text(text: &str) -> WorkStatus {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return WorkStatus::Unknown;
        }
        if lower.contains("ongoing")
            || lower.contains("publicandose")
            || lower.contains("publicándose")
            || lower.contains("en emisión")
            || lower.contains("en emision")
        {
            WorkStatus::Ongoing
        } else if lower.contains("completed")
            || lower.contains("finalizado")
            || lower.contains("finalizada")
            || lower.contains("completado")
        {
            WorkStatus::Completed
        } else {
            WorkStatus::Unknown
        }
    }
}

/// A serialized publication tracked in the library catalog.
///
/// Created and owned by the catalog collaborator; the pipeline treats it as
/// immutable input except for the metadata-refresh flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    #[serde(rename = "type")]
    pub kind: WorkKind,
    pub source_name: String,
    pub source_url: String,
    pub source_language: Option<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: WorkStatus,
}

impl Work {
    /// Language the source publishes in; `en` when the catalog left it unset.
    pub fn source_language(&self) -> &str {
        self.source_language.as_deref().unwrap_or("en")
    }
}

/// The result of scraping a work's landing page. Replaces the catalog's
/// title/author/description/cover/tags/status fields atomically on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub status: Option<WorkStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub kind: WorkKind,
    pub source_name: String,
    pub source_url: String,
}
