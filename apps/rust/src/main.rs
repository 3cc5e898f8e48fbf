//! Operator CLI over the pipeline: metadata, discovery, chapter downloads
//! and EPUB bundling from the command line.
//!
//! Logging is initialized from `RUST_LOG` via `tracing_subscriber`;
//! runtime settings come from the environment (see `Settings::from_env`).

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use novel_lib::{
    ChapterSelection, ContentEnvelope, DiscoverOptions, Pipeline, Settings, TranslationUsage,
    Work, WorkKind, WorkStatus,
};

mod sources;

use sources::JsonSourceProvider;

#[derive(Parser)]
#[command(name = "novel_manager", about = "Serialized-fiction pipeline driver")]
struct Cli {
    /// Path to the generic-source configuration file
    #[arg(long, default_value = "sources.json", global = true)]
    sources: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape a work's landing page for its metadata
    Info {
        #[arg(long)]
        source: String,
        #[arg(long)]
        url: String,
    },
    /// Discover a work's chapters
    Chapters {
        #[arg(long)]
        source: String,
        #[arg(long)]
        url: String,
        /// Upper bound on discovered chapters (default 50, capped at 200)
        #[arg(long, default_value_t = 50)]
        max: usize,
        /// Parse only the first page of chained sources
        #[arg(long)]
        no_recursive: bool,
    },
    /// Materialize one chapter into the content store
    Chapter {
        #[arg(long)]
        source: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        work_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        number: f64,
        /// Work kind: novel or comic
        #[arg(long, default_value = "novel")]
        kind: String,
        /// Source language of the work
        #[arg(long, default_value = "en")]
        source_lang: String,
        /// Translate text chapters into this language
        #[arg(long)]
        target_lang: Option<String>,
    },
    /// Bundle chapters into an EPUB file
    Epub {
        #[arg(long)]
        source: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        work_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long, default_value = "en")]
        source_lang: String,
        /// Bundle a single chapter
        #[arg(long, conflicts_with_all = ["start", "end"])]
        chapter: Option<f64>,
        /// First chapter of an inclusive range
        #[arg(long)]
        start: Option<f64>,
        /// Last chapter of an inclusive range
        #[arg(long)]
        end: Option<f64>,
        /// Translate chapter text before bundling
        #[arg(long)]
        translate: bool,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[arg(long, default_value_t = 50)]
        max: usize,
    },
    /// Show translation backend usage
    Usage,
    /// List every registered source
    Sources,
}

fn make_work(
    work_id: String,
    title: String,
    author: Option<String>,
    kind: WorkKind,
    source: String,
    url: String,
    source_lang: String,
) -> Work {
    Work {
        id: work_id,
        title,
        author,
        kind,
        source_name: source,
        source_url: url,
        source_language: Some(source_lang),
        cover_url: None,
        description: None,
        tags: vec![],
        status: WorkStatus::Unknown,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&filter))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("reading settings from the environment")?;
    let provider = JsonSourceProvider::new(&cli.sources);
    let pipeline = Pipeline::assemble(settings, Some(&provider))
        .await
        .context("assembling the pipeline")?;

    match cli.command {
        Command::Info { source, url } => {
            let metadata = pipeline.work_metadata(&source, &url).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::Chapters {
            source,
            url,
            max,
            no_recursive,
        } => {
            let opts = DiscoverOptions {
                recursive: !no_recursive,
                max,
            };
            let chapters = pipeline.discover_chapters(&source, &url, opts).await?;
            for chapter in &chapters {
                println!(
                    "{:>8}  {}  {}",
                    chapter.number,
                    chapter.chapter_title.as_deref().unwrap_or(&chapter.title),
                    chapter.url
                );
            }
            println!("{} chapter(s)", chapters.len());
        }
        Command::Chapter {
            source,
            url,
            work_id,
            title,
            number,
            kind,
            source_lang,
            target_lang,
        } => {
            let kind = match kind.as_str() {
                "comic" | "manhwa" => WorkKind::Comic,
                _ => WorkKind::Novel,
            };
            let work = make_work(
                work_id,
                title,
                None,
                kind,
                source.clone(),
                url.clone(),
                source_lang,
            );
            let envelope = pipeline
                .get_chapter(&source, &url, &work, number, target_lang.as_deref())
                .await?;
            match envelope {
                ContentEnvelope::Text { body } => {
                    println!("stored {} chars of chapter text", body.len());
                }
                ContentEnvelope::Comic(manifest) => {
                    println!("stored comic manifest with {} image(s)", manifest.total);
                }
            }
        }
        Command::Epub {
            source,
            url,
            work_id,
            title,
            author,
            source_lang,
            chapter,
            start,
            end,
            translate,
            out,
            max,
        } => {
            let selection = match (chapter, start, end) {
                (Some(n), _, _) => ChapterSelection::Single(n),
                (None, None, None) => ChapterSelection::All,
                (None, start, end) => ChapterSelection::Range { start, end },
            };
            let work = make_work(
                work_id,
                title,
                author,
                WorkKind::Novel,
                source.clone(),
                url.clone(),
                source_lang,
            );

            let chapters = pipeline
                .discover_chapters(&source, &url, DiscoverOptions { recursive: true, max })
                .await?;
            let (bytes, filename) = pipeline
                .build_bundle(&work, &chapters, &selection, translate, None)
                .await?;

            let path = out.join(&filename);
            tokio::fs::write(&path, &bytes).await?;
            println!("wrote {} ({} bytes)", path.display(), bytes.len());
        }
        Command::Usage => match pipeline.translation_usage().await? {
            TranslationUsage::Metered { used, limit } => {
                let percent = TranslationUsage::Metered { used, limit }
                    .percent()
                    .unwrap_or(0.0);
                println!("{used}/{limit} characters used ({percent:.1}%)");
            }
            TranslationUsage::Unsupported => println!("backend reports no usage"),
        },
        Command::Sources => {
            for name in pipeline.registry().names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}
