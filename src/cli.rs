//! Command-line interface definitions for shomoy_feed.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Global options can be provided via command-line flags or environment
//! variables, and override values from the config file.

use crate::config::Config;
use clap::{Parser, Subcommand};

/// Command-line arguments for the shomoy_feed application.
///
/// # Examples
///
/// ```sh
/// # Fetch category pages through a local FlareSolverr
/// shomoy_feed fetch --html-dir ./pages
///
/// # Merge the saved pages into the feed
/// shomoy_feed merge --html-dir ./pages -f ./public/articles.xml
///
/// # Both, restricted to one category
/// shomoy_feed run --category opinion
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, global = true, env = "SHOMOY_FEED_CONFIG")]
    pub config: Option<String>,

    /// Directory holding the `<category>.html` snapshots
    #[arg(long, global = true, env = "SHOMOY_FEED_HTML_DIR")]
    pub html_dir: Option<String>,

    /// Path of the RSS feed file
    #[arg(short, long, global = true, env = "SHOMOY_FEED_PATH")]
    pub feed_path: Option<String>,

    /// Maximum number of items kept in the feed
    #[arg(long, global = true)]
    pub max_items: Option<usize>,

    /// FlareSolverr endpoint
    #[arg(long, global = true, env = "FLARESOLVERR_URL")]
    pub solver_url: Option<String>,

    /// Only process these categories (repeatable)
    #[arg(long = "category", global = true)]
    pub categories: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fetch category pages through FlareSolverr and save them as HTML
    Fetch,
    /// Extract articles from saved pages and merge them into the feed
    Merge,
    /// Fetch, then merge
    Run,
}

impl Cli {
    /// Apply flag and environment overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(html_dir) = &self.html_dir {
            config.html_dir = html_dir.clone();
        }
        if let Some(feed_path) = &self.feed_path {
            config.feed_path = feed_path.clone();
        }
        if let Some(max_items) = self.max_items {
            config.max_items = max_items;
        }
        if let Some(solver_url) = &self.solver_url {
            config.solver_url = solver_url.clone();
        }
    }
}
