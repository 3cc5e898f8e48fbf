//! Text processing utilities.

use once_cell::sync::Lazy;
use regex::Regex;

/// Remove extra whitespace (multiple spaces, tabs, newlines).
pub fn normalize_whitespace(s: &str) -> String {
    static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    WHITESPACE_REGEX.replace_all(s, " ").trim().to_string()
}

/// Render a chapter number without a trailing `.0` for whole values.
pub fn format_chapter_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        format!("{}", number as i64)
    } else {
        format!("{}", number)
    }
}

/// Make a work title safe for use in a filename.
pub fn sanitize_filename(title: &str) -> String {
    static UNSAFE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\:*?"<>|]"#).unwrap());
    let cleaned = UNSAFE_REGEX.replace_all(title.trim(), "");
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Escape text for inclusion in XML/XHTML documents.
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Truncate a string to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Fold raw chapter text into HTML paragraphs.
///
/// Consecutive non-blank lines become one `<p>`; blank lines and
/// separator lines made of dashes end the current paragraph. Lines
/// carrying link dumps (`PDF:`, raw `http` URLs) are dropped.
pub fn raw_text_to_paragraphs(content: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.replace('-', "").trim().is_empty() {
            if !current.is_empty() {
                out.push(format!("<p>{}</p>", current.join(" ")));
                current.clear();
            }
            continue;
        }

        if line.contains("PDF:") || line.contains("http") {
            continue;
        }

        current.push(line);
    }

    if !current.is_empty() {
        out.push(format!("<p>{}</p>", current.join(" ")));
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_runs() {
        assert_eq!(normalize_whitespace("a \t b\n\nc"), "a b c");
    }

    #[test]
    fn chapter_numbers_render_cleanly() {
        assert_eq!(format_chapter_number(42.0), "42");
        assert_eq!(format_chapter_number(12.5), "12.5");
        assert_eq!(format_chapter_number(0.0), "0");
    }

    #[test]
    fn filenames_drop_hostile_characters() {
        assert_eq!(sanitize_filename("The Hollow Gate"), "The_Hollow_Gate");
        assert_eq!(sanitize_filename("a/b: c?"), "ab_c");
    }

    #[test]
    fn paragraph_folding_skips_links_and_separators() {
        let raw = "42\nThe Hollow Gate\n\nFirst line.\nSecond line.\n---\nPDF: somewhere\nhttp://x.example\nLast.";
        let html = raw_text_to_paragraphs(raw);
        assert_eq!(
            html,
            "<p>42 The Hollow Gate</p>\n<p>First line. Second line.</p>\n<p>Last.</p>"
        );
    }

    #[test]
    fn truncate_respects_boundaries() {
        assert_eq!(truncate_chars("Capítulo", 4), "Capí");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
