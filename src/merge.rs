//! Merging extracted articles into the persisted feed.
//!
//! The merge is `load → dedup against existing → append → trim → persist`.
//! This module owns the in-memory steps; loading and persisting live in
//! [`crate::outputs::rss`].
//!
//! Links are stored in their detail-page form (`/details/<slug>`), and the
//! comparison against existing items happens on that form too, so re-running
//! with the same input appends nothing.

use crate::models::{ArticleRecord, Enclosure, FeedDocument, FeedItem};
use crate::utils::rfc822_timestamp;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Link canonicalization and capacity settings for the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub listing_segment: String,
    pub detail_segment: String,
    pub max_items: usize,
}

impl MergeOptions {
    /// Rewrite the first `/{listing}/` path segment to `/{detail}/`.
    pub fn canonical_link(&self, url: &str) -> String {
        let listing = format!("/{}/", self.listing_segment);
        let detail = format!("/{}/", self.detail_segment);
        url.trim().replacen(&listing, &detail, 1)
    }
}

/// Counts produced by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub skipped_existing: usize,
    pub evicted: usize,
    pub total: usize,
}

/// Append unseen articles to `feed` and trim it to `max_items`.
///
/// `now` is used for articles without a source timestamp.
#[instrument(level = "info", skip_all, fields(incoming = articles.len(), existing = feed.channel.items.len()))]
pub fn merge_articles(
    feed: &mut FeedDocument,
    articles: &[ArticleRecord],
    opts: &MergeOptions,
    now: DateTime<Utc>,
) -> MergeReport {
    let mut seen: HashSet<String> = feed
        .channel
        .items
        .iter()
        .map(|item| opts.canonical_link(&item.link))
        .collect();

    let mut report = MergeReport::default();
    for article in articles {
        let link = opts.canonical_link(&article.url);
        if !seen.insert(link.clone()) {
            debug!(%link, "Already in feed");
            report.skipped_existing += 1;
            continue;
        }
        feed.channel.items.push(feed_item(article, link, now));
        report.added += 1;
    }

    report.evicted = trim_items(&mut feed.channel.items, opts.max_items);
    report.total = feed.channel.items.len();
    info!(
        added = report.added,
        skipped = report.skipped_existing,
        evicted = report.evicted,
        total = report.total,
        "Merged articles into feed"
    );
    report
}

/// Drop the oldest items until at most `max_items` remain. Returns how many were dropped.
pub fn trim_items(items: &mut Vec<FeedItem>, max_items: usize) -> usize {
    if items.len() <= max_items {
        return 0;
    }
    let excess = items.len() - max_items;
    items.drain(..excess);
    excess
}

fn feed_item(article: &ArticleRecord, link: String, now: DateTime<Utc>) -> FeedItem {
    let pub_date = article
        .published_at
        .clone()
        .unwrap_or_else(|| rfc822_timestamp(now));
    FeedItem {
        title: article.title.clone(),
        link,
        description: article.description.clone(),
        pub_date: Some(pub_date),
        enclosure: article
            .image_url
            .as_deref()
            .map(|url| Enclosure::new(url, image_mime_type(url))),
        extra: Vec::new(),
    }
}

/// Guess an image MIME type from the URL's extension, defaulting to JPEG.
pub fn image_mime_type(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}
