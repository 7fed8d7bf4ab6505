//! Last-resort extraction by matching article tuples in the raw HTML.
//!
//! Some pages ship article data as plain JSON (an API response inlined into a
//! script, for example) instead of the indexed Nuxt array. There the four
//! fields sit next to each other as literal `"key":"value"` pairs:
//!
//! ```text
//! "headline":"…","slug":"019a…","thumb":"…","published_at":"…"
//! ```
//!
//! The gaps between pairs may only span up to [`MAX_GAP`] characters other
//! than `{` and `}`, which keeps a match inside a single, compact object.
//! Descriptions are not recovered here.

use super::ExtractOptions;
use crate::models::ArticleRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

/// Longest run of characters allowed between two fields of one tuple.
pub const MAX_GAP: usize = 400;

static ARTICLE_TUPLE: Lazy<Regex> = Lazy::new(|| {
    let gap = format!("[^{{}}]{{0,{MAX_GAP}}}?");
    let pattern = [
        r#""headline"\s*:\s*"(?P<headline>(?:[^"\\]|\\.)*)""#,
        gap.as_str(),
        r#""slug"\s*:\s*"(?P<slug>(?:[^"\\]|\\.)*)""#,
        gap.as_str(),
        r#""thumb"\s*:\s*(?:"(?P<thumb>(?:[^"\\]|\\.)*)"|null)"#,
        gap.as_str(),
        r#""published_at"\s*:\s*(?:"(?P<published>(?:[^"\\]|\\.)*)"|null)"#,
    ]
    .concat();
    Regex::new(&pattern).unwrap()
});

/// Decode a captured JSON string body (`\u09..`, `\"`, …).
///
/// Falls back to the raw capture if it is not a valid JSON string.
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}

/// Match headline/slug/thumb/published_at tuples directly in the HTML source.
pub fn extract(html: &str, opts: &ExtractOptions) -> Vec<ArticleRecord> {
    let mut articles = Vec::new();
    let mut matches = 0usize;

    for caps in ARTICLE_TUPLE.captures_iter(html) {
        matches += 1;
        let field = |name: &str| caps.name(name).map(|m| unescape(m.as_str())).unwrap_or_default();
        let title = field("headline");
        let slug = field("slug");
        let image_url = field("thumb");
        let published_at = field("published");

        match opts.candidate(&slug, &title, "", &published_at, &image_url) {
            Some(record) => articles.push(record),
            None => debug!(%slug, %title, "Rejected pattern match"),
        }
    }

    info!(matches, accepted = articles.len(), "Scanned HTML for article tuples");
    articles
}
