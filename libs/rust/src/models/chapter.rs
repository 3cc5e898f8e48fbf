use serde::{Deserialize, Serialize};

use crate::utils::text::format_chapter_number;

/// A chapter's identity and location, without its body.
///
/// Numbers are monotone per work but not necessarily contiguous; fractional
/// releases (12.5) are valid. Read/downloaded flags are kept by the catalog
/// collaborator, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDescriptor {
    pub title: String,
    pub number: f64,
    pub chapter_title: Option<String>,
    pub url: String,
}

impl ChapterDescriptor {
    pub fn new(number: f64, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            number,
            chapter_title: None,
            url: url.into(),
        }
    }

    pub fn with_chapter_title(mut self, chapter_title: impl Into<String>) -> Self {
        self.chapter_title = Some(chapter_title.into());
        self
    }
}

/// One image slot in a comic chapter, ordered by `index` (1-based).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default)]
    pub alt: String,
    pub width: Option<String>,
    pub height: Option<String>,
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

/// The persisted manifest for a comic chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicManifest {
    pub images: Vec<ImageRef>,
    #[serde(rename = "total_images")]
    pub total: usize,
}

impl ComicManifest {
    pub fn new(images: Vec<ImageRef>) -> Self {
        let total = images.len();
        Self { images, total }
    }
}

/// What materializing a chapter produces: cleaned text, or an image manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentEnvelope {
    #[serde(rename = "novel")]
    Text { body: String },
    #[serde(rename = "manhwa")]
    Comic(ComicManifest),
}

impl ContentEnvelope {
    pub fn text(body: impl Into<String>) -> Self {
        ContentEnvelope::Text { body: body.into() }
    }
}

/// Default display title for a chapter number, in the source's convention.
pub fn chapter_display_title(number: f64) -> String {
    format!("Capítulo {}", format_chapter_number(number))
}
