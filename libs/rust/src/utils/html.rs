//! HTML scraping helpers using the scraper crate.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Parse an HTML string into a document.
pub fn parse_document(html: &str) -> Html {
    Html::parse_document(html)
}

/// Safely create a CSS selector.
pub fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Extract trimmed text content from an element.
pub fn text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extract text from the first element matching `css` in the document.
pub fn select_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document.select(&sel).next().map(|e| text(&e))
}

/// Extract an attribute from the first element matching `css` in the document.
pub fn select_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .next()
        .and_then(|e| e.value().attr(attr))
        .map(String::from)
}

/// Extract text from the first descendant of `element` matching `css`.
pub fn select_text_el(element: &ElementRef, css: &str) -> Option<String> {
    let sel = selector(css)?;
    element.select(&sel).next().map(|e| text(&e))
}

/// Extract an attribute from the first descendant of `element` matching `css`.
pub fn select_attr_el(element: &ElementRef, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    element
        .select(&sel)
        .next()
        .and_then(|e| e.value().attr(attr))
        .map(String::from)
}

/// Collect every element matching `css` in the document.
pub fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    selector(css)
        .map(|s| document.select(&s).collect())
        .unwrap_or_default()
}

static SCRIPT_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "iframe", "noscript"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}>")).unwrap())
        .collect()
});

static DANGLING_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(?:script|style|iframe|noscript)\b[^>]*>").unwrap());

/// Remove `script`, `style`, `iframe` and `noscript` blocks from a fragment.
pub fn strip_script_blocks(html: &str) -> String {
    let mut out = html.to_string();
    for re in SCRIPT_BLOCKS.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    DANGLING_TAGS.replace_all(&out, "").into_owned()
}

/// Remove every element whose tag name starts with `prefix` (e.g. ad widgets).
pub fn strip_prefixed_tags(html: &str, prefix: &str) -> String {
    let block =
        Regex::new(&format!(r"(?is)<{prefix}[a-z0-9-]*\b[^>]*>.*?</{prefix}[a-z0-9-]*>")).unwrap();
    let dangling = Regex::new(&format!(r"(?i)</?{prefix}[a-z0-9-]*\b[^>]*/?>")).unwrap();
    let out = block.replace_all(html, "");
    dangling.replace_all(&out, "").into_owned()
}

static OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([a-zA-Z][a-zA-Z0-9-]*)(\s+[^<>]*?)?(/?)>").unwrap());

/// Drop attributes from every opening tag except those listed in `keep`.
pub fn strip_attributes_except(html: &str, keep: &[&str]) -> String {
    OPEN_TAG
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            if keep.iter().any(|k| k.eq_ignore_ascii_case(name)) {
                caps[0].to_string()
            } else {
                format!("<{}{}>", name, &caps[3])
            }
        })
        .into_owned()
}

static EMPTY_P: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>\s*</p>").unwrap());
static EMPTY_DIV: Lazy<Regex> = Lazy::new(|| Regex::new(r"<div>\s*</div>").unwrap());
static EMPTY_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<span>\s*</span>").unwrap());

/// Remove empty paragraph-level elements left over after cleaning.
pub fn remove_empty_elements(html: &str) -> String {
    let mut out = html.to_string();
    loop {
        let next = EMPTY_SPAN
            .replace_all(
                &EMPTY_DIV.replace_all(&EMPTY_P.replace_all(&out, ""), ""),
                "",
            )
            .into_owned();
        if next == out {
            return next;
        }
        out = next;
    }
}

/// Apply a list of removal patterns to a fragment.
pub fn apply_unwanted_patterns(html: &str, patterns: &[Regex]) -> String {
    let mut out = html.to_string();
    for re in patterns {
        out = re.replace_all(&out, "").into_owned();
    }
    out
}

/// Compile pattern strings, skipping (and logging) invalid ones.
pub fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(&format!("(?is){p}")) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!("skipping invalid pattern {:?}: {}", p, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_text_and_attrs() {
        let doc = parse_document(r#"<div class="t"><a href="/x">Chapter 1</a></div>"#);
        assert_eq!(select_text(&doc, ".t a").as_deref(), Some("Chapter 1"));
        assert_eq!(select_attr(&doc, ".t a", "href").as_deref(), Some("/x"));
        assert!(select_text(&doc, ".missing").is_none());
    }

    #[test]
    fn strips_script_blocks_and_orphans() {
        let html = "<p>keep</p><script>var x = 1;</script><style>p{}</style><iframe src=\"x\">";
        assert_eq!(strip_script_blocks(html), "<p>keep</p>");
    }

    #[test]
    fn strips_ad_widgets_by_prefix() {
        let html = "<p>a</p><miad-block1 data-x=\"1\">ad</miad-block1><miad-block4/>";
        assert_eq!(strip_prefixed_tags(html, "miad-"), "<p>a</p>");
    }

    #[test]
    fn attribute_stripping_spares_links_and_images() {
        let html = r#"<div class="x" style="a"><a href="/y">t</a><img src="i.jpg"></div>"#;
        assert_eq!(
            strip_attributes_except(html, &["a", "img"]),
            r#"<div><a href="/y">t</a><img src="i.jpg"></div>"#
        );
    }

    #[test]
    fn removes_nested_empty_elements() {
        assert_eq!(remove_empty_elements("<div><p> </p></div><p>x</p>"), "<p>x</p>");
    }
}
