//! Extraction from the Nuxt hydration payload.
//!
//! Nuxt serializes page state into `<script id="__NUXT_DATA__">` as one flat
//! JSON array. Objects inside it do not hold their values directly; an
//! integer field is an index pointing at another slot of the same array:
//!
//! ```text
//! index:  5                                          6            7
//!         {"headline": 6, "slug": 7, ...}            "Headline"   "019a…"
//! ```
//!
//! [`StateArray`] wraps that array and resolves such references with a
//! bounded number of hops, so cyclic chains terminate.

use super::ExtractOptions;
use crate::models::ArticleRecord;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Maximum number of index hops followed by [`StateArray::resolve`].
pub const MAX_RESOLVE_DEPTH: usize = 5;

static STATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script#__NUXT_DATA__[type="application/json"]"#).unwrap()
});

/// An indexable view over the flat, self-referential state array.
#[derive(Debug, Clone, Copy)]
pub struct StateArray<'a> {
    values: &'a [Value],
}

impl<'a> StateArray<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Follow index references starting at `value`.
    ///
    /// A non-negative integer within bounds is replaced by the element at that
    /// index, repeatedly, at most [`MAX_RESOLVE_DEPTH`] times. Anything else is
    /// returned unchanged. After the last hop the current value is returned as
    /// is, even if it is still an index.
    pub fn resolve(&self, value: &'a Value) -> &'a Value {
        let mut current = value;
        for _ in 0..MAX_RESOLVE_DEPTH {
            match self.index_of(current) {
                Some(index) => current = &self.values[index],
                None => break,
            }
        }
        current
    }

    /// Resolve an optional field and coerce it to a trimmed string.
    ///
    /// Only JSON strings survive; unresolved integers, `null`, booleans,
    /// arrays and objects all become the empty string.
    pub fn resolve_str(&self, value: Option<&'a Value>) -> String {
        match value.map(|v| self.resolve(v)) {
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        }
    }

    fn index_of(&self, value: &Value) -> Option<usize> {
        value
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < self.values.len())
    }
}

/// Text of the first `__NUXT_DATA__` JSON script, if the page has one.
pub fn find_state_blob(document: &Html) -> Option<String> {
    document
        .select(&STATE_SELECTOR)
        .next()
        .map(|script| script.text().collect::<String>())
}

/// Extract article records from the page's embedded state.
///
/// Returns an empty list when the marker is missing, the JSON is malformed,
/// or the payload is not an array.
pub fn extract(document: &Html, opts: &ExtractOptions) -> Vec<ArticleRecord> {
    let Some(blob) = find_state_blob(document) else {
        info!("No __NUXT_DATA__ script found");
        return Vec::new();
    };

    let parsed: Value = match serde_json::from_str(blob.trim()) {
        Ok(v) => v,
        Err(e) => {
            warn!(
                error = %e,
                preview = %truncate_for_log(blob.trim(), 120),
                "Malformed embedded state; skipping"
            );
            return Vec::new();
        }
    };

    let Some(values) = parsed.as_array() else {
        warn!("Embedded state is not an array; skipping");
        return Vec::new();
    };

    extract_from_values(values, opts)
}

/// Scan every element of the state array for article-shaped objects.
///
/// An object holding both `headline` and `slug` keys is a candidate; its
/// fields are resolved through [`StateArray::resolve`] and validated by
/// [`ExtractOptions::candidate`].
pub fn extract_from_values(values: &[Value], opts: &ExtractOptions) -> Vec<ArticleRecord> {
    let state = StateArray::new(values);
    if state.is_empty() {
        return Vec::new();
    }
    let mut articles = Vec::new();
    let mut candidates = 0usize;

    for (index, value) in values.iter().enumerate() {
        let Some(object) = value.as_object() else {
            continue;
        };
        if !(object.contains_key("headline") && object.contains_key("slug")) {
            continue;
        }
        candidates += 1;

        let field = |key: &str| state.resolve_str(object.get(key));
        let slug = field("slug");
        let title = field("headline");
        let mut description = field("excerpt");
        if description.is_empty() {
            description = field("content");
        }
        let published_at = field("published_at");
        let image_url = field("thumb");

        match opts.candidate(&slug, &title, &description, &published_at, &image_url) {
            Some(record) => articles.push(record),
            None => debug!(index, %slug, %title, "Rejected state candidate"),
        }
    }

    info!(
        len = state.len(),
        candidates,
        accepted = articles.len(),
        "Scanned embedded state"
    );
    articles
}
