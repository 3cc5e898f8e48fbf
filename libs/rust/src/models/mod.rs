pub mod chapter;
pub mod source;
pub mod work;

pub use chapter::{chapter_display_title, ChapterDescriptor, ComicManifest, ContentEnvelope, ImageRef};
pub use source::{RevealAll, SourceConfig, SourcePatterns};
pub use work::{Work, WorkKind, WorkMetadata, WorkStatus};
