//! Bundling of chapter runs into a single navigable EPUB.
//!
//! Chapters come from the content store when present and are materialized
//! (and optionally translated) through the adapter otherwise. The archive
//! carries a title page, a linear spine in ascending chapter order, a
//! navigation document and per-chapter XHTML files.

use std::io::{Cursor, Write};

use tracing::warn;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult};
use crate::models::{ChapterDescriptor, ContentEnvelope, Work};
use crate::scrapers::Scraper;
use crate::storage::{ContentStore, StoreFormat};
use crate::translation::Translator;
use crate::utils::text::{format_chapter_number, sanitize_filename, xml_escape};

/// Which chapters of a work go into the bundle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChapterSelection {
    All,
    Single(f64),
    Range { start: Option<f64>, end: Option<f64> },
}

impl ChapterSelection {
    pub fn validate(&self) -> AppResult<()> {
        match self {
            ChapterSelection::Single(n) if *n < 0.0 => Err(AppError::BundleSelectionInvalid(
                format!("chapter number {} is negative", n),
            )),
            ChapterSelection::Range {
                start: Some(start),
                end: Some(end),
            } if start > end => Err(AppError::BundleSelectionInvalid(format!(
                "start {} is after end {}",
                start, end
            ))),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, number: f64) -> bool {
        match self {
            ChapterSelection::All => true,
            ChapterSelection::Single(n) => *n == number,
            ChapterSelection::Range { start, end } => {
                start.map_or(true, |s| number >= s) && end.map_or(true, |e| number <= e)
            }
        }
    }
}

struct ChapterDoc {
    number: f64,
    title: Option<String>,
    body: String,
}

/// Bundle filename: `<title>[_chapter_<N> | _chapters_<start>_<end>][_<lang>].epub`.
pub fn epub_filename(
    title: &str,
    selection: &ChapterSelection,
    translate: bool,
    target_lang: &str,
) -> String {
    let mut name = sanitize_filename(title);
    match selection {
        ChapterSelection::Single(n) => {
            name.push_str(&format!("_chapter_{}", format_chapter_number(*n)));
        }
        ChapterSelection::Range { start, end } => {
            name.push_str(&format!(
                "_chapters_{}_{}",
                start.map(format_chapter_number).unwrap_or_else(|| "start".to_string()),
                end.map(format_chapter_number).unwrap_or_else(|| "end".to_string())
            ));
        }
        ChapterSelection::All => {}
    }
    if translate {
        name.push_str(&format!("_{}", target_lang.to_lowercase()));
    }
    name.push_str(".epub");
    name
}

/// Assemble chapters into an EPUB, returning its bytes and filename.
#[allow(clippy::too_many_arguments)]
pub async fn build_epub(
    work: &Work,
    chapters: &[ChapterDescriptor],
    selection: &ChapterSelection,
    translate: bool,
    target_lang: &str,
    scraper: &dyn Scraper,
    store: &ContentStore,
    translator: Option<&Translator>,
) -> AppResult<(Vec<u8>, String)> {
    selection.validate()?;

    let language = if translate {
        target_lang.to_lowercase()
    } else {
        work.source_language().to_lowercase()
    };
    let filename = epub_filename(&work.title, selection, translate, target_lang);

    if let ChapterSelection::Single(n) = selection {
        if let Some(bytes) = store.get_bytes(work, *n, StoreFormat::Epub, &language).await? {
            return Ok((bytes, filename));
        }
    }

    let mut selected: Vec<&ChapterDescriptor> = chapters
        .iter()
        .filter(|c| selection.contains(c.number))
        .collect();
    selected.sort_by(|a, b| a.number.total_cmp(&b.number));

    let mut docs: Vec<ChapterDoc> = Vec::new();
    for chapter in selected {
        match chapter_body(work, chapter, translate, target_lang, scraper, store, translator).await
        {
            Ok(body) => docs.push(ChapterDoc {
                number: chapter.number,
                title: chapter.chapter_title.clone(),
                body,
            }),
            // Quota exhaustion is terminal; a failed chapter is skipped.
            Err(e @ AppError::TranslationQuotaExceeded { .. }) => return Err(e),
            Err(e) => {
                warn!("Error processing chapter {}: {}", chapter.number, e);
                continue;
            }
        }
    }

    if docs.is_empty() {
        return Err(AppError::BundleEmpty);
    }

    let identifier = match selection {
        ChapterSelection::Single(n) => format!("{}_{}", work.id, format_chapter_number(*n)),
        _ => work.id.clone(),
    };
    let bytes = write_epub(
        &identifier,
        &work.title,
        work.author.as_deref().unwrap_or("Unknown"),
        &language,
        &docs,
    )?;

    if let ChapterSelection::Single(n) = selection {
        store
            .put_bytes(work, *n, StoreFormat::Epub, &language, &bytes)
            .await?;
    }

    Ok((bytes, filename))
}

/// The chapter's body in the output language, store-first on both the
/// source text and any translation.
async fn chapter_body(
    work: &Work,
    chapter: &ChapterDescriptor,
    translate: bool,
    target_lang: &str,
    scraper: &dyn Scraper,
    store: &ContentStore,
    translator: Option<&Translator>,
) -> AppResult<String> {
    let source_lang = work.source_language().to_lowercase();

    let body = match store.get_text(work, chapter.number, &source_lang).await? {
        Some(cached) => cached,
        None => match scraper.chapter_content(&chapter.url, work, chapter.number).await? {
            ContentEnvelope::Text { body } => body,
            ContentEnvelope::Comic(_) => {
                return Err(AppError::Other(
                    "comic chapters cannot be bundled into an e-book".to_string(),
                ))
            }
        },
    };
    if body.trim().is_empty() {
        return Err(AppError::Other(format!(
            "chapter {} produced no content",
            chapter.number
        )));
    }

    if !translate || target_lang.eq_ignore_ascii_case(&source_lang) {
        return Ok(body);
    }

    let target_norm = target_lang.to_lowercase();
    if let Some(cached) = store.get_text(work, chapter.number, &target_norm).await? {
        return Ok(cached);
    }

    let translator = translator.ok_or_else(|| {
        AppError::Config("translation requested but no translator is configured".to_string())
    })?;
    let translated = translator
        .translate_html(&body, Some(&source_lang), target_lang)
        .await?;
    store
        .put_text(work, chapter.number, &target_norm, &translated)
        .await?;
    Ok(translated)
}

fn chapter_file_name(number: f64) -> String {
    format!("chapter_{}.xhtml", format_chapter_number(number))
}

fn chapter_item_id(number: f64) -> String {
    format!("chapter-{}", format_chapter_number(number).replace('.', "-"))
}

fn xhtml_document(language: &str, title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" xml:lang="{language}" lang="{language}">
<head><title>{title}</title></head>
<body>
{body}
</body>
</html>
"#
    )
}

fn render_chapter_doc(language: &str, doc: &ChapterDoc) -> String {
    let heading = format!("Chapter {}", format_chapter_number(doc.number));
    let mut body = format!("<h1>{}</h1>\n", xml_escape(&heading));
    if let Some(title) = &doc.title {
        body.push_str(&format!("<h2>{}</h2>\n", xml_escape(title)));
    }
    body.push_str(&format!("<div class=\"chapter-body\">{}</div>", doc.body));
    xhtml_document(language, &heading, &body)
}

fn render_title_page(language: &str, title: &str, author: &str) -> String {
    let body = format!(
        "<section class=\"title-page\">\n<h1>{}</h1>\n<p class=\"author\">{}</p>\n</section>",
        xml_escape(title),
        xml_escape(author)
    );
    xhtml_document(language, title, &body)
}

fn render_nav(language: &str, title: &str, docs: &[ChapterDoc]) -> String {
    let mut items = String::new();
    for doc in docs {
        let label = match &doc.title {
            Some(t) => format!(
                "Chapter {}: {}",
                format_chapter_number(doc.number),
                xml_escape(t)
            ),
            None => format!("Chapter {}", format_chapter_number(doc.number)),
        };
        items.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter_file_name(doc.number),
            label
        ));
    }
    let body = format!(
        "<nav epub:type=\"toc\" id=\"toc\">\n  <h1>{}</h1>\n  <ol>\n    <li><a href=\"title.xhtml\">Title</a></li>\n{}  </ol>\n</nav>",
        xml_escape(title),
        items
    );
    xhtml_document(language, title, &body)
}

fn render_opf(
    identifier: &str,
    title: &str,
    author: &str,
    language: &str,
    docs: &[ChapterDoc],
) -> String {
    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    let mut manifest = String::from(
        "    <item id=\"title-page\" href=\"title.xhtml\" media-type=\"application/xhtml+xml\"/>\n    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    let mut spine = String::from("    <itemref idref=\"title-page\"/>\n");
    for doc in docs {
        manifest.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            chapter_item_id(doc.number),
            chapter_file_name(doc.number)
        ));
        spine.push_str(&format!(
            "    <itemref idref=\"{}\"/>\n",
            chapter_item_id(doc.number)
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="pub-id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="pub-id">{identifier}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{language}</dc:language>
    <dc:creator>{author}</dc:creator>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine>
{spine}  </spine>
</package>
"#,
        identifier = xml_escape(identifier),
        title = xml_escape(title),
        language = xml_escape(language),
        author = xml_escape(author),
        modified = modified,
        manifest = manifest,
        spine = spine,
    )
}

/// Write the archive: stored `mimetype` first, then the container and the
/// OEBPS documents.
fn write_epub(
    identifier: &str,
    title: &str,
    author: &str,
    language: &str,
    docs: &[ChapterDoc],
) -> AppResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default();

    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(
        br#"<?xml version="1.0" encoding="utf-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#,
    )?;

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(render_opf(identifier, title, author, language, docs).as_bytes())?;

    zip.start_file("OEBPS/title.xhtml", deflated)?;
    zip.write_all(render_title_page(language, title, author).as_bytes())?;

    zip.start_file("OEBPS/nav.xhtml", deflated)?;
    zip.write_all(render_nav(language, title, docs).as_bytes())?;

    for doc in docs {
        zip.start_file(format!("OEBPS/{}", chapter_file_name(doc.number)), deflated)?;
        zip.write_all(render_chapter_doc(language, doc).as_bytes())?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WorkKind, WorkMetadata, WorkStatus};
    use crate::scrapers::DiscoverOptions;
    use async_trait::async_trait;
    use std::io::Read;

    fn test_work() -> Work {
        Work {
            id: "w1".to_string(),
            title: "Title".to_string(),
            author: Some("Author".to_string()),
            kind: WorkKind::Novel,
            source_name: "stub".to_string(),
            source_url: "https://example.com/w/1".to_string(),
            source_language: Some("en".to_string()),
            cover_url: None,
            description: None,
            tags: vec![],
            status: WorkStatus::Ongoing,
        }
    }

    fn descriptors(range: std::ops::RangeInclusive<i64>) -> Vec<ChapterDescriptor> {
        range
            .map(|n| {
                ChapterDescriptor::new(
                    n as f64,
                    format!("Chapter {n}"),
                    format!("https://example.com/c/{n}"),
                )
                .with_chapter_title(format!("The One About {n}"))
            })
            .collect()
    }

    /// Adapter stub: chapters 1..=10 have bodies, everything else errors.
    struct StubScraper;

    #[async_trait]
    impl Scraper for StubScraper {
        fn name(&self) -> &str {
            "stub"
        }

        fn kind(&self) -> WorkKind {
            WorkKind::Novel
        }

        async fn work_info(&self, _url: &str) -> AppResult<WorkMetadata> {
            unimplemented!("not used in bundler tests")
        }

        async fn chapters(
            &self,
            _url: &str,
            _opts: &DiscoverOptions,
        ) -> AppResult<Vec<ChapterDescriptor>> {
            unimplemented!("not used in bundler tests")
        }

        async fn chapter_content(
            &self,
            url: &str,
            _work: &Work,
            number: f64,
        ) -> AppResult<ContentEnvelope> {
            if (1.0..=10.0).contains(&number) {
                Ok(ContentEnvelope::text(format!("<p>body {number}</p>")))
            } else {
                Err(AppError::FetchHttp {
                    url: url.to_string(),
                    status: 404,
                })
            }
        }
    }

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut out = String::new();
        entry.read_to_string(&mut out).unwrap();
        out
    }

    fn chapter_entries(bytes: &[u8]) -> Vec<String> {
        let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut names: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with("OEBPS/chapter_"))
            .map(String::from)
            .collect();
        names.sort();
        names
    }

    fn store() -> (tempfile::TempDir, ContentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn range_bundle_has_five_chapters_in_order() {
        let (_dir, store) = store();
        let work = test_work();
        let selection = ChapterSelection::Range {
            start: Some(3.0),
            end: Some(7.0),
        };

        let (bytes, filename) = build_epub(
            &work,
            &descriptors(1..=10),
            &selection,
            false,
            "ES",
            &StubScraper,
            &store,
            None,
        )
        .await
        .unwrap();

        assert_eq!(filename, "Title_chapters_3_7.epub");
        assert_eq!(chapter_entries(&bytes).len(), 5);

        let opf = read_entry(&bytes, "OEBPS/content.opf");
        let spine_order: Vec<&str> = ["title-page", "chapter-3", "chapter-4", "chapter-5", "chapter-6", "chapter-7"]
            .into_iter()
            .collect();
        let mut cursor = 0;
        for idref in spine_order {
            let needle = format!("<itemref idref=\"{}\"/>", idref);
            let pos = opf[cursor..].find(&needle).expect("spine entry present");
            cursor += pos;
        }
        assert!(opf.contains("<dc:identifier id=\"pub-id\">w1</dc:identifier>"));
        assert!(opf.contains("<dc:language>en</dc:language>"));
    }

    #[tokio::test]
    async fn failed_chapters_are_skipped() {
        let (_dir, store) = store();
        let work = test_work();

        // 9..=12: two real chapters, two that 404.
        let (bytes, _) = build_epub(
            &work,
            &descriptors(9..=12),
            &ChapterSelection::All,
            false,
            "ES",
            &StubScraper,
            &store,
            None,
        )
        .await
        .unwrap();

        assert_eq!(chapter_entries(&bytes).len(), 2);
    }

    #[tokio::test]
    async fn empty_bundles_are_an_error() {
        let (_dir, store) = store();
        let work = test_work();

        let err = build_epub(
            &work,
            &descriptors(11..=12),
            &ChapterSelection::All,
            false,
            "ES",
            &StubScraper,
            &store,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BundleEmpty));
    }

    #[tokio::test]
    async fn invalid_ranges_are_rejected() {
        let (_dir, store) = store();
        let work = test_work();

        let err = build_epub(
            &work,
            &descriptors(1..=10),
            &ChapterSelection::Range {
                start: Some(7.0),
                end: Some(3.0),
            },
            false,
            "ES",
            &StubScraper,
            &store,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BundleSelectionInvalid(_)));
    }

    #[tokio::test]
    async fn single_chapter_bundles_are_cached() {
        let (_dir, store) = store();
        let work = test_work();
        let selection = ChapterSelection::Single(5.0);

        let (bytes, filename) = build_epub(
            &work,
            &descriptors(1..=10),
            &selection,
            false,
            "ES",
            &StubScraper,
            &store,
            None,
        )
        .await
        .unwrap();

        assert_eq!(filename, "Title_chapter_5.epub");
        assert!(store.exists(&work, 5.0, StoreFormat::Epub, "en").await);

        let opf = read_entry(&bytes, "OEBPS/content.opf");
        assert!(opf.contains("<dc:identifier id=\"pub-id\">w1_5</dc:identifier>"));

        // A second build serves the cached archive byte for byte.
        let (again, _) = build_epub(
            &work,
            &descriptors(1..=10),
            &selection,
            false,
            "ES",
            &StubScraper,
            &store,
            None,
        )
        .await
        .unwrap();
        assert_eq!(again, bytes);
    }

    #[tokio::test]
    async fn cached_source_text_avoids_the_scraper() {
        let (_dir, store) = store();
        let work = test_work();

        // Chapter 42 is not materializable by the stub, but the store has it.
        store
            .put_text(&work, 42.0, "en", "<p>from the store</p>")
            .await
            .unwrap();

        let (bytes, _) = build_epub(
            &work,
            &[ChapterDescriptor::new(42.0, "Chapter 42", "https://example.com/c/42")],
            &ChapterSelection::Single(42.0),
            false,
            "ES",
            &StubScraper,
            &store,
            None,
        )
        .await
        .unwrap();

        let doc = read_entry(&bytes, "OEBPS/chapter_42.xhtml");
        assert!(doc.contains("from the store"));
        assert!(doc.contains("<h1>Chapter 42</h1>"));
    }

    #[test]
    fn filenames_cover_every_selection_shape() {
        assert_eq!(
            epub_filename("My Title", &ChapterSelection::All, false, "ES"),
            "My_Title.epub"
        );
        assert_eq!(
            epub_filename("My Title", &ChapterSelection::Single(12.5), false, "ES"),
            "My_Title_chapter_12.5.epub"
        );
        assert_eq!(
            epub_filename(
                "My Title",
                &ChapterSelection::Range {
                    start: None,
                    end: Some(9.0)
                },
                true,
                "ES"
            ),
            "My_Title_chapters_start_9_es.epub"
        );
    }

    #[test]
    fn selection_membership() {
        let range = ChapterSelection::Range {
            start: Some(3.0),
            end: Some(7.0),
        };
        assert!(range.contains(3.0));
        assert!(range.contains(7.0));
        assert!(!range.contains(7.5));
        assert!(ChapterSelection::All.contains(0.5));
        assert!(ChapterSelection::Single(2.5).contains(2.5));
        assert!(!ChapterSelection::Single(2.5).contains(2.0));
    }
}
