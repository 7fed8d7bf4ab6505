//! Runtime configuration for fetching, extraction and feed merging.
//!
//! Every field has a default matching the Dainik Amader Shomoy setup, so the
//! binary works without any config file. A YAML file passed with `--config`
//! may override any subset of fields, and a few CLI flags override the file.
//!
//! ```yaml
//! feed_path: ./public/articles.xml
//! max_items: 200
//! categories:
//!   - name: opinion
//!     url: https://www.dainikamadershomoy.com/category/all/opinion
//! ```

use crate::extract::ExtractOptions;
use crate::merge::MergeOptions;
use serde::Deserialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Process-wide settings passed explicitly into the fetcher, extractor and merger.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site root used to build article links, without a trailing slash.
    pub base_url: String,
    /// Path segment used by listing links (`/news/<slug>`).
    pub listing_segment: String,
    /// Path segment used by detail pages (`/details/<slug>`).
    pub detail_segment: String,
    /// FlareSolverr `/v1` endpoint.
    pub solver_url: String,
    /// `maxTimeout` forwarded to FlareSolverr, in milliseconds.
    pub solver_max_timeout_ms: u64,
    /// Category pages to fetch and extract, in merge order.
    pub categories: Vec<Category>,
    /// Directory holding `<category>.html` snapshots.
    pub html_dir: String,
    /// Location of the persisted RSS feed.
    pub feed_path: String,
    /// Metadata written when a fresh feed is created.
    pub channel: ChannelConfig,
    /// Maximum number of items kept in the feed.
    pub max_items: usize,
    /// Titles must be strictly longer than this many characters.
    pub min_title_len: usize,
    /// Slugs must be strictly longer than this many characters.
    pub min_slug_len: usize,
    /// Default slug prefix for categories that do not set their own.
    pub slug_prefix: String,
    /// Descriptions longer than this are cut and end with `...`.
    pub description_max_len: usize,
}

/// One category listing page.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub slug_prefix: Option<String>,
}

impl Category {
    /// Path of the HTML snapshot for this category inside `html_dir`.
    pub fn html_path(&self, html_dir: impl AsRef<Path>) -> PathBuf {
        html_dir.as_ref().join(format!("{}.html", self.name))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelConfig {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: "Dainik Amader Shomoy Opinion".to_string(),
            link: "https://www.dainikamadershomoy.com/category/all/opinion".to_string(),
            description: "Latest opinion articles from Dainik Amader Shomoy".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://www.dainikamadershomoy.com".to_string(),
            listing_segment: "news".to_string(),
            detail_segment: "details".to_string(),
            solver_url: "http://localhost:8191/v1".to_string(),
            solver_max_timeout_ms: 60_000,
            categories: vec![
                Category {
                    name: "opinion".to_string(),
                    url: "https://www.dainikamadershomoy.com/category/all/opinion".to_string(),
                    slug_prefix: None,
                },
                Category {
                    name: "shompadokiyo".to_string(),
                    url: "https://www.dainikamadershomoy.com/category/all/shompadokiyo"
                        .to_string(),
                    slug_prefix: None,
                },
            ],
            html_dir: ".".to_string(),
            feed_path: "articles.xml".to_string(),
            channel: ChannelConfig::default(),
            max_items: 500,
            min_title_len: 5,
            min_slug_len: 10,
            slug_prefix: "019a".to_string(),
            description_max_len: 300,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for
    /// this structure. A missing `path` is not an error.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path).await?;
        let config = Self::from_yaml(&raw)?;
        info!(path, categories = config.categories.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from YAML text. Absent fields keep their defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Categories selected by name, or all of them when `names` is empty.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first requested category that is not configured.
    pub fn select_categories(&self, names: &[String]) -> Result<Vec<Category>, Box<dyn Error>> {
        if names.is_empty() {
            return Ok(self.categories.clone());
        }
        names
            .iter()
            .map(|name| {
                self.categories
                    .iter()
                    .find(|c| &c.name == name)
                    .cloned()
                    .ok_or_else(|| -> Box<dyn Error> { format!("unknown category: {name}").into() })
            })
            .collect()
    }

    /// Extraction options for one category page.
    pub fn extract_options(&self, category: &Category) -> ExtractOptions {
        ExtractOptions {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            listing_segment: self.listing_segment.clone(),
            slug_prefix: category
                .slug_prefix
                .clone()
                .unwrap_or_else(|| self.slug_prefix.clone()),
            min_title_len: self.min_title_len,
            min_slug_len: self.min_slug_len,
            description_max_len: self.description_max_len,
        }
    }

    /// Options for merging extracted articles into the feed.
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            listing_segment: self.listing_segment.clone(),
            detail_segment: self.detail_segment.clone(),
            max_items: self.max_items,
        }
    }
}
