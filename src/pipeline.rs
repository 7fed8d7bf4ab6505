//! The extract-and-merge batch run.
//!
//! 1. **Load**: read `<html_dir>/<category>.html` for each selected category
//! 2. **Extract**: recover article records from each page
//! 3. **Dedup**: within each page, then across pages
//! 4. **Merge**: append unseen articles to the feed and trim it
//! 5. **Persist**: atomically replace the feed file
//!
//! A missing page only skips that category. The run fails when no page at
//! all could be read, or when the feed cannot be read or written.

use crate::config::{Category, Config};
use crate::dedup::{DocumentArticles, dedup_documents};
use crate::extract::extract_articles;
use crate::merge::{MergeReport, merge_articles};
use crate::outputs::rss::{load_feed, save_feed};
use crate::utils::ensure_writable_dir;
use chrono::Utc;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// Counts gathered over one merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Pages that could be read.
    pub documents: usize,
    /// Records extracted from the pages, each page already unique by URL.
    pub extracted: usize,
    /// Repeated URLs dropped inside a single page.
    pub duplicates_within: usize,
    pub duplicates_across: usize,
    pub merge: MergeReport,
}

/// Read and extract every selected category page that exists.
///
/// Also returns how many in-page duplicate records the extractor dropped.
#[instrument(level = "info", skip_all, fields(html_dir = %config.html_dir))]
pub async fn load_documents(config: &Config, categories: &[Category]) -> (Vec<DocumentArticles>, usize) {
    let mut documents = Vec::new();
    let mut duplicates = 0usize;
    for category in categories {
        let path = category.html_path(&config.html_dir);
        let html = match fs::read_to_string(&path).await {
            Ok(html) => html,
            Err(e) => {
                warn!(
                    category = %category.name,
                    path = %path.display(),
                    error = %e,
                    "Category page unavailable; skipping"
                );
                continue;
            }
        };

        let extraction = extract_articles(&html, &config.extract_options(category));
        info!(
            category = %category.name,
            method = %extraction.method,
            count = extraction.articles.len(),
            duplicates = extraction.duplicates,
            "Processed category page"
        );
        duplicates += extraction.duplicates;
        documents.push(DocumentArticles {
            source: category.name.clone(),
            articles: extraction.articles,
        });
    }
    (documents, duplicates)
}

/// Extract articles from the saved pages and merge them into the feed.
///
/// # Errors
///
/// Returns an error if no category page could be read, or if loading or
/// persisting the feed fails. The feed on disk is untouched in that case.
#[instrument(level = "info", skip_all, fields(feed_path = %config.feed_path))]
pub async fn run_merge(config: &Config, categories: &[Category]) -> Result<MergeSummary, Box<dyn Error>> {
    let (documents, duplicates_in_pages) = load_documents(config, categories).await;
    if documents.is_empty() {
        error!(requested = categories.len(), "No usable HTML input");
        return Err("no usable HTML input found".into());
    }

    let document_count = documents.len();
    let extracted: usize = documents.iter().map(|d| d.articles.len()).sum();
    let deduped = dedup_documents(documents);
    if deduped.articles.is_empty() {
        warn!("No articles found in any category page");
    }

    let feed_path = Path::new(&config.feed_path);
    if let Some(parent) = feed_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_writable_dir(parent).await?;
    }

    let mut feed = load_feed(feed_path, &config.channel).await?;
    let merge = merge_articles(
        &mut feed,
        &deduped.articles,
        &config.merge_options(),
        Utc::now(),
    );
    save_feed(feed_path, &feed).await?;

    Ok(MergeSummary {
        documents: document_count,
        extracted,
        duplicates_within: duplicates_in_pages + deduped.within_document,
        duplicates_across: deduped.across_documents,
        merge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::rss::parse_feed;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "shomoy_feed_pipeline_{}_{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config_for(dir: &Path) -> Config {
        Config {
            html_dir: dir.to_string_lossy().into_owned(),
            feed_path: dir.join("out").join("articles.xml").to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    fn nuxt_page(state: &str) -> String {
        format!(
            r#"<!DOCTYPE html><html><head><title>Opinion</title></head><body><div id="__nuxt"></div>
<script type="application/json" data-nuxt-data="nuxt-app" data-ssr="true" id="__NUXT_DATA__">{state}</script>
</body></html>"#
        )
    }

    const SCENARIO: &str = r#"[["ShallowReactive",1],{"data":2},{},null,"x",{"headline":6,"slug":7,"excerpt":8,"published_at":9,"thumb":10},"A Long Enough Headline Text","019aabcdefg","Some excerpt","2024-01-01T00:00:00Z","http://img/1.jpg"]"#;

    fn read_feed(config: &Config) -> crate::models::FeedDocument {
        parse_feed(&std::fs::read_to_string(&config.feed_path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let dir = scratch_dir("scenario");
        std::fs::write(dir.join("opinion.html"), nuxt_page(SCENARIO)).unwrap();
        let config = config_for(&dir);

        let summary = run_merge(&config, &config.categories).await.unwrap();
        assert_eq!(summary.documents, 1, "shompadokiyo.html is absent");
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.merge.added, 1);

        let feed = read_feed(&config);
        assert_eq!(feed.channel.title, config.channel.title);
        assert_eq!(feed.channel.items.len(), 1);
        let item = &feed.channel.items[0];
        assert_eq!(item.title, "A Long Enough Headline Text");
        assert_eq!(
            item.link,
            "https://www.dainikamadershomoy.com/details/019aabcdefg"
        );
        assert_eq!(item.description, "Some excerpt");
        assert_eq!(item.pub_date.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(item.enclosure.as_ref().unwrap().url, "http://img/1.jpg");

        let raw = std::fs::read_to_string(&config.feed_path).unwrap();
        assert!(raw.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));

        let again = run_merge(&config, &config.categories).await.unwrap();
        assert_eq!(again.merge.added, 0);
        assert_eq!(read_feed(&config).channel.items.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_merges_into_legacy_feed() {
        let dir = scratch_dir("legacy");
        std::fs::write(dir.join("opinion.html"), nuxt_page(SCENARIO)).unwrap();
        let config = config_for(&dir);
        std::fs::create_dir_all(dir.join("out")).unwrap();
        std::fs::write(
            &config.feed_path,
            "<?xml version='1.0' encoding='utf-8'?>\n<rss version=\"2.0\"><channel><title>Dainik Amader Shomoy Opinion</title><link>https://www.dainikamadershomoy.com/category/all/opinion</link><description>Latest opinion articles from Dainik Amader Shomoy</description><item><title>Older opinion piece</title><link>https://www.dainikamadershomoy.com/news/019aaaaaaaaaa</link><description /><pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate></item></channel></rss>",
        )
        .unwrap();

        let summary = run_merge(&config, &config.categories).await.unwrap();
        assert_eq!(summary.merge.added, 1);
        assert_eq!(summary.merge.total, 2);

        let feed = read_feed(&config);
        assert_eq!(feed.channel.items[0].title, "Older opinion piece");
        assert_eq!(
            feed.channel.items[0].link,
            "https://www.dainikamadershomoy.com/news/019aaaaaaaaaa"
        );
        assert_eq!(feed.channel.items[1].title, "A Long Enough Headline Text");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_merge_keeps_foreign_elements() {
        let dir = scratch_dir("foreign");
        std::fs::write(dir.join("opinion.html"), nuxt_page(SCENARIO)).unwrap();
        let config = config_for(&dir);
        std::fs::create_dir_all(dir.join("out")).unwrap();
        std::fs::write(
            &config.feed_path,
            r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Opinion</title>
    <link>https://www.dainikamadershomoy.com</link>
    <description>Latest</description>
    <language>bn</language>
    <item><title>Old A</title><link>https://www.dainikamadershomoy.com/details/019aaaaaaaaaa</link><guid>old-a</guid></item>
    <atom:link href="https://example.com/articles.xml" rel="self"/>
    <item><title>Old B</title><link>https://www.dainikamadershomoy.com/details/019abbbbbbbbb</link></item>
  </channel>
</rss>"#,
        )
        .unwrap();

        let summary = run_merge(&config, &config.categories).await.unwrap();
        assert_eq!(summary.merge.added, 1);
        assert_eq!(summary.merge.total, 3);

        let raw = std::fs::read_to_string(&config.feed_path).unwrap();
        assert!(raw.contains("<language>bn</language>"));
        assert!(raw.contains("<guid>old-a</guid>"));
        assert!(raw.contains(r#"<atom:link href="https://example.com/articles.xml" rel="self"/>"#));
        assert!(raw.contains(r#"xmlns:atom="http://www.w3.org/2005/Atom""#));

        let feed = read_feed(&config);
        let titles: Vec<_> = feed.channel.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Old A", "Old B", "A Long Enough Headline Text"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_non_utf8_feed_is_replaced() {
        let dir = scratch_dir("non_utf8");
        std::fs::write(dir.join("opinion.html"), nuxt_page(SCENARIO)).unwrap();
        let config = config_for(&dir);
        std::fs::create_dir_all(dir.join("out")).unwrap();
        std::fs::write(&config.feed_path, b"<rss><channel><title>\xff\xfe</title></channel></rss>").unwrap();

        let summary = run_merge(&config, &config.categories).await.unwrap();
        assert_eq!(summary.merge.total, 1);
        assert_eq!(read_feed(&config).channel.title, config.channel.title);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_timestamp_generated_at_merge() {
        let dir = scratch_dir("timestamp");
        let state = r#"[{"headline":1,"slug":2},"A Long Enough Headline Text","019aabcdefg"]"#;
        std::fs::write(dir.join("opinion.html"), nuxt_page(state)).unwrap();
        let config = config_for(&dir);

        run_merge(&config, &config.categories).await.unwrap();
        let feed = read_feed(&config);
        let pub_date = feed.channel.items[0].pub_date.clone().unwrap();
        assert!(pub_date.ends_with(" +0000"));
        assert!(chrono::DateTime::parse_from_rfc2822(&pub_date).is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_cross_category_articles_are_dropped() {
        let dir = scratch_dir("cross");
        let opinion = r#"[{"headline":2,"slug":3},{"headline":4,"slug":5},"Shared Headline Text","019ashared-slug","Opinion Only Headline","019aopinion-only"]"#;
        let editorial = r#"[{"headline":1,"slug":2},"Shared Headline Text","019ashared-slug"]"#;
        std::fs::write(dir.join("opinion.html"), nuxt_page(opinion)).unwrap();
        std::fs::write(dir.join("shompadokiyo.html"), nuxt_page(editorial)).unwrap();
        let config = config_for(&dir);

        let summary = run_merge(&config, &config.categories).await.unwrap();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.duplicates_across, 2);
        assert_eq!(summary.merge.added, 1);

        let feed = read_feed(&config);
        assert_eq!(feed.channel.items[0].title, "Opinion Only Headline");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_trims_to_max_items() {
        let dir = scratch_dir("trim");
        let mut values = Vec::new();
        for i in 0..6 {
            values.push(serde_json::json!({
                "headline": format!("Generated headline number {i}"),
                "slug": format!("019a-generated-{i}"),
            }));
        }
        let state = serde_json::to_string(&values).unwrap();
        std::fs::write(dir.join("opinion.html"), nuxt_page(&state)).unwrap();
        let mut config = config_for(&dir);
        config.max_items = 4;

        let summary = run_merge(&config, &config.categories).await.unwrap();
        assert_eq!(summary.merge.added, 6);
        assert_eq!(summary.merge.evicted, 2);

        let feed = read_feed(&config);
        assert_eq!(feed.channel.items.len(), 4);
        assert_eq!(feed.channel.items[0].title, "Generated headline number 2");
        assert_eq!(feed.channel.items[3].title, "Generated headline number 5");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_no_input_fails_and_leaves_feed() {
        let dir = scratch_dir("noinput");
        let config = config_for(&dir);
        std::fs::create_dir_all(dir.join("out")).unwrap();
        std::fs::write(&config.feed_path, "existing").unwrap();

        assert!(run_merge(&config, &config.categories).await.is_err());
        assert_eq!(std::fs::read_to_string(&config.feed_path).unwrap(), "existing");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_page_without_articles_still_writes_feed() {
        let dir = scratch_dir("empty");
        std::fs::write(dir.join("opinion.html"), "<html><body>nothing</body></html>").unwrap();
        let config = config_for(&dir);

        let summary = run_merge(&config, &config.categories).await.unwrap();
        assert_eq!(summary.merge.added, 0);
        assert!(read_feed(&config).channel.items.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
