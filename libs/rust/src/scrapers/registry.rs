//! Name → adapter-factory registry.
//!
//! Built once at startup (built-in adapters plus any configured generic
//! sources), then read-only: the process-wide instance is installed into a
//! `OnceCell` and never mutated afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::SourceConfig;
use crate::scrapers::generic::GenericScraper;
use crate::scrapers::manhwaweb::ManhwawebScraper;
use crate::scrapers::pastebin::PastebinScraper;
use crate::scrapers::skynovels::SkynovelsScraper;
use crate::scrapers::{Scraper, ScraperContext};

pub type ScraperFactory = Arc<dyn Fn(Arc<ScraperContext>) -> Box<dyn Scraper> + Send + Sync>;

#[derive(Default)]
pub struct ScraperRegistry {
    entries: HashMap<String, ScraperFactory>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the hand-tuned site adapters registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            "pastebin_tbate",
            Arc::new(|ctx| Box::new(PastebinScraper::new(ctx)) as Box<dyn Scraper>),
        );
        registry.register(
            "manhwaweb",
            Arc::new(|ctx| Box::new(ManhwawebScraper::new(ctx)) as Box<dyn Scraper>),
        );
        registry.register(
            "skynovels",
            Arc::new(|ctx| Box::new(SkynovelsScraper::new(ctx)) as Box<dyn Scraper>),
        );
        registry
    }

    pub fn register(&mut self, name: &str, factory: ScraperFactory) {
        self.entries.insert(name.to_lowercase(), factory);
    }

    /// Register a configuration-driven source under its own name.
    pub fn register_source(&mut self, config: SourceConfig) {
        let name = config.name.clone();
        info!("Registering configured source {:?}", name);
        self.register(
            &name,
            Arc::new(move |ctx| {
                Box::new(GenericScraper::new(config.clone(), ctx)) as Box<dyn Scraper>
            }),
        );
    }

    /// Instantiate the adapter registered under `name` (case-insensitive).
    pub fn resolve(&self, name: &str, ctx: Arc<ScraperContext>) -> AppResult<Box<dyn Scraper>> {
        let factory = self
            .entries
            .get(&name.to_lowercase())
            .ok_or_else(|| AppError::UnknownSource(name.to_string()))?;
        Ok(factory(ctx))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

static GLOBAL: OnceCell<Arc<ScraperRegistry>> = OnceCell::new();

/// Install the process-wide registry. Call once at startup, before any
/// dispatch; later calls are rejected and the first registry stays frozen.
pub fn install(registry: Arc<ScraperRegistry>) -> AppResult<()> {
    GLOBAL
        .set(registry)
        .map_err(|_| AppError::Other("scraper registry already installed".to_string()))
}

/// The installed registry, or a fresh built-in one when none was installed.
pub fn global() -> Arc<ScraperRegistry> {
    GLOBAL.get_or_init(|| Arc::new(ScraperRegistry::builtin())).clone()
}
