//! File-backed source-configuration provider for the CLI.
//!
//! Generic sources live in a single JSON file (default `sources.json`), an
//! array of source configurations. The server deployment keeps these in its
//! own database; the CLI only needs something it can edit by hand.

use std::path::PathBuf;

use async_trait::async_trait;
use novel_lib::{AppError, AppResult, SourceConfig, SourceProvider};

pub struct JsonSourceProvider {
    path: PathBuf,
}

impl JsonSourceProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> AppResult<Vec<SourceConfig>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SourceProvider for JsonSourceProvider {
    async fn list_sources(&self) -> AppResult<Vec<SourceConfig>> {
        self.read_all().await
    }

    async fn get_source(&self, name: &str) -> AppResult<Option<SourceConfig>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name)))
    }

    async fn persist_source(&self, config: &SourceConfig) -> AppResult<()> {
        let mut sources = self.read_all().await?;
        match sources
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(&config.name))
        {
            Some(existing) => *existing = config.clone(),
            None => sources.push(config.clone()),
        }
        let json = serde_json::to_vec_pretty(&sources)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novel_lib::WorkKind;

    #[tokio::test]
    async fn persists_and_lists_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let provider = JsonSourceProvider::new(dir.path().join("sources.json"));

        assert!(provider.list_sources().await.unwrap().is_empty());

        let config = SourceConfig::new("wuxiaworld", "https://www.wuxiaworld.com", WorkKind::Novel);
        provider.persist_source(&config).await.unwrap();

        let listed = provider.list_sources().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            provider.get_source("WuxiaWorld").await.unwrap().unwrap().name,
            "wuxiaworld"
        );

        // Persisting the same name replaces, not duplicates.
        provider.persist_source(&config).await.unwrap();
        assert_eq!(provider.list_sources().await.unwrap().len(), 1);
    }
}
