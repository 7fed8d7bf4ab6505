//! Article extraction from saved category pages.
//!
//! A category page is tried with up to three methods, stopping at the first
//! one that yields anything:
//!
//! | Method | Module | Source |
//! |--------|--------|--------|
//! | Embedded state | [`state`] | `__NUXT_DATA__` hydration array |
//! | Pattern | [`pattern`] | `"headline"…"slug"…` tuples in the raw HTML |
//! | Anchors | [`anchors`] | `<a href="/news/…">` cards in the rendered markup |
//!
//! Every method funnels its raw fields through [`ExtractOptions::candidate`]
//! or [`ExtractOptions::record`], so validation and normalization are shared.
//! The winning method's records are deduplicated by URL, first occurrence
//! kept. Extraction never fails: malformed input is logged and produces no
//! records.

pub mod anchors;
pub mod pattern;
pub mod state;

use crate::dedup::unique_by_url;
use crate::models::ArticleRecord;
use crate::utils::{is_numeric, looks_like_url, truncate_description};
use scraper::Html;
use std::fmt;
use tracing::{info, instrument, warn};

/// Thresholds and URL conventions for one category page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Site root without a trailing slash.
    pub base_url: String,
    /// Path segment of listing links, e.g. `news`.
    pub listing_segment: String,
    /// Every accepted slug starts with this.
    pub slug_prefix: String,
    pub min_title_len: usize,
    pub min_slug_len: usize,
    pub description_max_len: usize,
}

impl ExtractOptions {
    /// Slugs must be non-numeric, longer than `min_slug_len` and carry the prefix.
    pub fn is_valid_slug(&self, slug: &str) -> bool {
        !slug.is_empty()
            && !is_numeric(slug)
            && slug.chars().count() > self.min_slug_len
            && slug.starts_with(&self.slug_prefix)
    }

    /// Titles must be non-numeric, longer than `min_title_len` and not a link.
    pub fn is_valid_title(&self, title: &str) -> bool {
        !title.is_empty()
            && !is_numeric(title)
            && title.chars().count() > self.min_title_len
            && !looks_like_url(title)
    }

    /// Absolute listing URL for a slug.
    pub fn article_url(&self, slug: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.listing_segment, slug)
    }

    /// Validate raw fields keyed by slug and build a record from them.
    ///
    /// Returns `None` when the slug or title fails validation.
    pub fn candidate(
        &self,
        slug: &str,
        title: &str,
        description: &str,
        published_at: &str,
        image_url: &str,
    ) -> Option<ArticleRecord> {
        if !self.is_valid_slug(slug) || !self.is_valid_title(title) {
            return None;
        }
        Some(self.record(
            self.article_url(slug),
            title,
            description,
            published_at,
            image_url,
        ))
    }

    /// Build a record for an already known URL, normalizing the optional fields.
    pub fn record(
        &self,
        url: String,
        title: &str,
        description: &str,
        published_at: &str,
        image_url: &str,
    ) -> ArticleRecord {
        ArticleRecord {
            url,
            title: title.trim().to_string(),
            description: truncate_description(description.trim(), self.description_max_len),
            published_at: non_empty(published_at),
            image_url: non_empty(image_url),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Which extraction method produced a page's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    EmbeddedState,
    Pattern,
    Anchors,
    Nothing,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionMethod::EmbeddedState => "embedded_state",
            ExtractionMethod::Pattern => "pattern",
            ExtractionMethod::Anchors => "anchors",
            ExtractionMethod::Nothing => "nothing",
        };
        f.write_str(name)
    }
}

/// Records recovered from one page, in source order, unique by URL.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub method: ExtractionMethod,
    pub articles: Vec<ArticleRecord>,
    /// Records dropped because their URL already appeared earlier on the page.
    pub duplicates: usize,
}

/// Extract article records from one saved category page.
#[instrument(level = "info", skip_all, fields(bytes = html.len(), prefix = %opts.slug_prefix))]
pub fn extract_articles(html: &str, opts: &ExtractOptions) -> Extraction {
    let document = Html::parse_document(html);

    let found = state::extract(&document, opts);
    if !found.is_empty() {
        return finish(ExtractionMethod::EmbeddedState, found);
    }

    info!("Embedded state yielded nothing; trying pattern fallback");
    let found = pattern::extract(html, opts);
    if !found.is_empty() {
        return finish(ExtractionMethod::Pattern, found);
    }

    info!("Pattern fallback yielded nothing; trying anchor fallback");
    let found = anchors::extract(&document, opts);
    if !found.is_empty() {
        return finish(ExtractionMethod::Anchors, found);
    }

    warn!("No articles found by any extraction method");
    finish(ExtractionMethod::Nothing, Vec::new())
}

fn finish(method: ExtractionMethod, found: Vec<ArticleRecord>) -> Extraction {
    let (articles, duplicates) = unique_by_url(found);
    info!(%method, count = articles.len(), duplicates, "Extracted articles");
    Extraction {
        method,
        articles,
        duplicates,
    }
}

#[cfg(test)]
pub(crate) fn test_options() -> ExtractOptions {
    ExtractOptions {
        base_url: "https://www.dainikamadershomoy.com".to_string(),
        listing_segment: "news".to_string(),
        slug_prefix: "019a".to_string(),
        min_title_len: 5,
        min_slug_len: 10,
        description_max_len: 300,
    }
}
