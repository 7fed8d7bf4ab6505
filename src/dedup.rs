//! Deduplication within and across category pages.
//!
//! Category pages are expected to be disjoint. An article listed under two
//! categories is treated as ambiguous and dropped from all of them rather than
//! kept once. Inside a single page the first occurrence of a URL wins.

use crate::models::ArticleRecord;
use itertools::Itertools;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Records extracted from one source document.
#[derive(Debug, Clone)]
pub struct DocumentArticles {
    /// Document identifier, the category name.
    pub source: String,
    pub articles: Vec<ArticleRecord>,
}

/// Flattened, deduplicated articles plus counts for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub articles: Vec<ArticleRecord>,
    /// Records removed because their URL already appeared earlier in the same document.
    pub within_document: usize,
    /// Records removed because their URL appeared in more than one document.
    pub across_documents: usize,
}

/// Keep the first record for each URL, preserving order.
///
/// Returns the unique records and how many were removed.
pub fn unique_by_url(articles: Vec<ArticleRecord>) -> (Vec<ArticleRecord>, usize) {
    let before = articles.len();
    let unique: Vec<ArticleRecord> = articles
        .into_iter()
        .unique_by(|a| a.url.clone())
        .collect();
    let removed = before - unique.len();
    (unique, removed)
}

/// Deduplicate each document, then drop URLs shared between documents.
///
/// The output keeps document order, and source order within each document.
#[instrument(level = "info", skip_all, fields(documents = documents.len()))]
pub fn dedup_documents(documents: Vec<DocumentArticles>) -> DedupReport {
    let mut within_document = 0usize;
    let per_document: Vec<DocumentArticles> = documents
        .into_iter()
        .map(|doc| {
            let (articles, removed) = unique_by_url(doc.articles);
            if removed > 0 {
                debug!(source = %doc.source, removed, "Removed duplicates within document");
            }
            within_document += removed;
            DocumentArticles {
                source: doc.source,
                articles,
            }
        })
        .collect();

    let shared: HashSet<String> = per_document
        .iter()
        .flat_map(|doc| doc.articles.iter().map(|a| a.url.as_str()))
        .counts()
        .into_iter()
        .filter(|&(_, n)| n > 1)
        .map(|(url, _)| url.to_string())
        .collect();

    let mut across_documents = 0usize;
    let mut articles = Vec::new();
    for doc in per_document {
        for article in doc.articles {
            if shared.contains(&article.url) {
                debug!(source = %doc.source, url = %article.url, "Dropping article listed in several documents");
                across_documents += 1;
            } else {
                articles.push(article);
            }
        }
    }

    info!(
        kept = articles.len(),
        within_document,
        across_documents,
        "Deduplicated articles"
    );
    DedupReport {
        articles,
        within_document,
        across_documents,
    }
}
