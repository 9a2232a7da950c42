//! Cleanup applied to extracted text before it becomes a [`Document`](crate::types::Document).
//!
//! Extractors for PDF/DOCX/PPTX leave markup, link noise, words split across
//! line breaks and decorative bullets behind; this normalizes them so chunk
//! boundaries and BM25 terms are not polluted.

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*(https?://\S+|www\.\S+)").expect("valid regex"));
static HYPHEN_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\n\s*").expect("valid regex"));
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new("•|\u{f071}|◉").expect("valid regex"));
static MANY_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static MANY_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));

pub fn remove_html_tags(text: &str) -> String {
    HTML_TAG.replace_all(text, "").into_owned()
}

pub fn remove_urls(text: &str) -> String {
    URL.replace_all(text, "").into_owned()
}

/// Join words hyphenated across a line break ("infor-\nmation" -> "information").
pub fn fix_hyphenated_words(text: &str) -> String {
    HYPHEN_BREAK.replace_all(text, "").into_owned()
}

pub fn normalize_bullets(text: &str) -> String {
    BULLET.replace_all(text, "- ").into_owned()
}

/// Replace em-dashes, collapse blank-line runs and repeated spaces, trim.
pub fn clean_whitespace(text: &str) -> String {
    let text = text.replace('—', " - ");
    let text = MANY_NEWLINES.replace_all(&text, "\n\n");
    MANY_SPACES.replace_all(&text, " ").trim().to_string()
}

/// Full normalization pipeline.
pub fn normalize(text: &str) -> String {
    let text = remove_html_tags(text);
    let text = remove_urls(&text);
    let text = fix_hyphenated_words(&text);
    let text = normalize_bullets(&text);
    clean_whitespace(&text)
}
