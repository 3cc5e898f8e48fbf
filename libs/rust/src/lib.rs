//! Core library of the serialized-fiction manager: source adapters, the
//! crawl engine, the content store, translation and EPUB bundling.
//!
//! External collaborators drive everything through [`service::Pipeline`]
//! and implement the [`service::Catalog`] and [`service::SourceProvider`]
//! interfaces it consumes.

pub mod browser;
pub mod config;
pub mod crawl;
pub mod epub;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod scrapers;
pub mod service;
pub mod storage;
pub mod translation;
pub mod utils;

pub use config::{Settings, TranslatorBackend};
pub use epub::ChapterSelection;
pub use error::{AppError, AppResult};
pub use fetcher::{FetchMode, Fetcher};
pub use models::{
    ChapterDescriptor, ComicManifest, ContentEnvelope, ImageRef, SourceConfig, Work, WorkKind,
    WorkMetadata, WorkStatus,
};
pub use scrapers::{DiscoverOptions, Scraper, ScraperContext, ScraperRegistry};
pub use service::{Catalog, Pipeline, SourceProvider};
pub use storage::{ContentStore, StoreFormat};
pub use translation::{Glossary, TranslationUsage, Translator};
