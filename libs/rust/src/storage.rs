//! Durable on-disk cache of chapter artifacts.
//!
//! Layout, per work:
//!
//! ```text
//! <root>/<title> - <id>/chapters/chapter_<N>_<format>_<lang>.<ext>
//! <root>/<title> - <id>/chapters/chapter_<N>_images/image_<NNN>.<ext>
//! ```
//!
//! Artifacts are written once and never mutated in place; writes go through
//! a temp file and an atomic rename, so readers see either nothing or the
//! complete artifact.

use std::io::Write;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::{ComicManifest, ImageRef, Work};
use crate::utils::text::format_chapter_number;

/// Concurrent image downloads per comic chapter.
const IMAGE_DOWNLOAD_CONCURRENCY: usize = 8;

/// Artifact formats the store knows how to key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    /// Cleaned chapter text.
    Raw,
    /// A packaged single-chapter bundle.
    Epub,
    /// A comic image manifest with a sibling image directory.
    Comic,
}

impl StoreFormat {
    /// On-disk token inside the artifact filename.
    pub fn token(&self) -> &'static str {
        match self {
            StoreFormat::Raw => "raw",
            StoreFormat::Epub => "epub",
            StoreFormat::Comic => "manhwa",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            StoreFormat::Raw => "txt",
            StoreFormat::Epub => "epub",
            StoreFormat::Comic => "json",
        }
    }
}

pub struct ContentStore {
    root: PathBuf,
    client: Client,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            client: Client::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chapters_dir(&self, work: &Work) -> PathBuf {
        self.root
            .join(format!("{} - {}", work.title, work.id))
            .join("chapters")
    }

    /// Deterministic path for an artifact key.
    pub fn artifact_path(
        &self,
        work: &Work,
        number: f64,
        format: StoreFormat,
        language: &str,
    ) -> PathBuf {
        self.chapters_dir(work).join(format!(
            "chapter_{}_{}_{}.{}",
            format_chapter_number(number),
            format.token(),
            language,
            format.extension()
        ))
    }

    fn images_dir(&self, work: &Work, number: f64) -> PathBuf {
        self.chapters_dir(work)
            .join(format!("chapter_{}_images", format_chapter_number(number)))
    }

    pub async fn exists(&self, work: &Work, number: f64, format: StoreFormat, language: &str) -> bool {
        tokio::fs::try_exists(self.artifact_path(work, number, format, language))
            .await
            .unwrap_or(false)
    }

    /// Raw bytes of an artifact, or `None` when it was never written.
    pub async fn get_bytes(
        &self,
        work: &Work,
        number: f64,
        format: StoreFormat,
        language: &str,
    ) -> AppResult<Option<Vec<u8>>> {
        let path = self.artifact_path(work, number, format, language);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_text(&self, work: &Work, number: f64, language: &str) -> AppResult<Option<String>> {
        Ok(self
            .get_bytes(work, number, StoreFormat::Raw, language)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Read back a comic manifest, preferring images already mirrored to
    /// disk; dangling local paths fall back to the remote URL.
    pub async fn get_comic(
        &self,
        work: &Work,
        number: f64,
        language: &str,
    ) -> AppResult<Option<ComicManifest>> {
        let Some(bytes) = self
            .get_bytes(work, number, StoreFormat::Comic, language)
            .await?
        else {
            return Ok(None);
        };
        let mut manifest: ComicManifest = serde_json::from_slice(&bytes)?;

        for image in &mut manifest.images {
            if let Some(local) = image.local_path.clone() {
                if tokio::fs::try_exists(&local).await.unwrap_or(false) {
                    image.url = local;
                } else {
                    image.local_path = None;
                }
            }
        }

        Ok(Some(manifest))
    }

    /// Idempotent write: an existing artifact is never replaced.
    pub async fn put_bytes(
        &self,
        work: &Work,
        number: f64,
        format: StoreFormat,
        language: &str,
        payload: &[u8],
    ) -> AppResult<()> {
        let path = self.artifact_path(work, number, format, language);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Artifact {} already cached, keeping existing bytes", path.display());
            return Ok(());
        }
        write_atomic(&path, payload.to_vec()).await
    }

    pub async fn put_text(
        &self,
        work: &Work,
        number: f64,
        language: &str,
        body: &str,
    ) -> AppResult<()> {
        self.put_bytes(work, number, StoreFormat::Raw, language, body.as_bytes())
            .await
    }

    /// Persist a comic manifest, mirroring its images to the sibling image
    /// directory. Entries whose download succeeds are rewritten to carry
    /// their local path; failures keep the remote URL.
    pub async fn put_comic(
        &self,
        work: &Work,
        number: f64,
        language: &str,
        manifest: &ComicManifest,
    ) -> AppResult<ComicManifest> {
        let path = self.artifact_path(work, number, StoreFormat::Comic, language);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Comic manifest {} already cached", path.display());
            return self
                .get_comic(work, number, language)
                .await?
                .ok_or(AppError::StoreMissing);
        }

        let images_dir = self.images_dir(work, number);
        tokio::fs::create_dir_all(&images_dir).await?;

        let mirrored: Vec<ImageRef> = stream::iter(manifest.images.clone())
            .map(|image| {
                let client = self.client.clone();
                let images_dir = images_dir.clone();
                async move { mirror_image(&client, &images_dir, image).await }
            })
            .buffered(IMAGE_DOWNLOAD_CONCURRENCY)
            .collect()
            .await;

        let stored = ComicManifest {
            total: mirrored.len(),
            images: mirrored,
        };
        let json = serde_json::to_vec_pretty(&stored)?;
        write_atomic(&path, json).await?;
        Ok(stored)
    }
}

/// Download one image next to the manifest. Failures are logged and the
/// original entry is kept untouched.
async fn mirror_image(client: &Client, images_dir: &Path, mut image: ImageRef) -> ImageRef {
    let filename = format!("image_{:03}.{}", image.index, image_extension(&image.url));
    let target = images_dir.join(filename);

    let downloaded = async {
        let response = client.get(&image.url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok::<_, reqwest::Error>(bytes)
    }
    .await;

    match downloaded {
        Ok(bytes) => match tokio::fs::write(&target, &bytes).await {
            Ok(()) => {
                image.local_path = Some(target.to_string_lossy().into_owned());
                image
            }
            Err(e) => {
                warn!("Error saving image {}: {}", image.url, e);
                image
            }
        },
        Err(e) => {
            warn!("Error downloading image {}: {}", image.url, e);
            image
        }
    }
}

/// Infer an image file extension from its source URL; `jpg` when unclear.
fn image_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 4 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string())
}

/// Write through a temp file in the destination directory and rename, so a
/// partially written artifact is never observable.
async fn write_atomic(path: &Path, payload: Vec<u8>) -> AppResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| AppError::Other(format!("artifact path {} has no parent", path.display())))?
        .to_path_buf();
    tokio::fs::create_dir_all(&parent).await?;

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> AppResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(&payload)?;
        tmp.persist(&path)
            .map_err(|e| AppError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Other(format!("storage write task failed: {e}")))?
}
