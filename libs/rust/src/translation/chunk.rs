//! Chunking of HTML fragments for translation.
//!
//! Engines accept a bounded payload per request. The splitter respects tag
//! boundaries: a chunk is a run of top-level block elements; a block larger
//! than the limit is subdivided along its nested blocks; an atomic block
//! that is still too large is passed through whole and left to the engine.

use scraper::{ElementRef, Html};

/// Upper bound on a translation request payload, in characters.
pub const MAX_CHUNK_CHARS: usize = 5_000;

/// Split an HTML fragment into translation chunks of at most `max` chars.
pub fn split_html_chunks(html: &str, max: usize) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut blocks = Vec::new();
    collect_blocks(fragment.root_element(), max, &mut blocks);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0_usize;

    for block in blocks {
        let block_len = block.chars().count();
        if current_len + block_len > max && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(&block);
        current_len += block_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Flatten an element's children into translation blocks, descending into
/// any block that exceeds the limit on its own.
fn collect_blocks(element: ElementRef<'_>, max: usize, out: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let html = child_el.html();
            if html.chars().count() <= max {
                out.push(html);
            } else if child_el.children().any(|c| ElementRef::wrap(c).is_some()) {
                collect_blocks(child_el, max, out);
            } else {
                // Atomic and oversized: the engine has to take it whole.
                out.push(html);
            }
        } else if let Some(text) = child.value().as_text() {
            if !text.trim().is_empty() {
                out.push(text.to_string());
            }
        }
    }
}
