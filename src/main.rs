//! # shomoy_feed
//!
//! Turns Dainik Amader Shomoy category pages into an RSS feed. Pages are
//! rendered through a FlareSolverr instance, article metadata is pulled out of
//! the Nuxt hydration payload (with regex and markup fallbacks), and new
//! articles are merged into a persistent RSS 2.0 file.
//!
//! ## Usage
//!
//! ```sh
//! shomoy_feed run --html-dir ./pages -f ./public/articles.xml
//! ```
//!
//! ## Architecture
//!
//! The application runs as two batch stages:
//! 1. **Fetching**: Save each category page as `<html_dir>/<category>.html`
//! 2. **Merging**: Extract, deduplicate, append to the feed, trim, and
//!    atomically rewrite the feed file
//!
//! The process exits non-zero when a fetch fails, when no saved page can be
//! read, or when the feed cannot be written.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dedup;
mod extract;
mod fetcher;
mod merge;
mod models;
mod outputs;
mod pipeline;
mod utils;

use cli::{Cli, Command};
use config::{Category, Config};
use fetcher::{FetchSummary, SolverClient};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "shomoy_feed starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = Config::load(args.config.as_deref()).await?;
    args.apply_overrides(&mut config);
    let categories = config.select_categories(&args.categories)?;

    match args.command {
        Command::Fetch => {
            let summary = fetch_stage(&config, &categories).await?;
            check_fetch(&summary)?;
        }
        Command::Merge => {
            merge_stage(&config, &categories).await?;
        }
        Command::Run => {
            let summary = fetch_stage(&config, &categories).await?;
            if !summary.all_succeeded() {
                warn!(failed = ?summary.failed, "Some fetches failed; merging what is available");
            }
            merge_stage(&config, &categories).await?;
            check_fetch(&summary)?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Fetch every selected category into `html_dir`.
#[instrument(level = "info", skip_all, fields(solver = %config.solver_url))]
async fn fetch_stage(config: &Config, categories: &[Category]) -> Result<FetchSummary, Box<dyn Error>> {
    let html_dir = Path::new(&config.html_dir);
    if let Err(e) = ensure_writable_dir(html_dir).await {
        error!(
            path = %config.html_dir,
            error = %e,
            "HTML directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let client = SolverClient::new(&config.solver_url, config.solver_max_timeout_ms)?;
    Ok(fetcher::fetch_categories(&client, categories, html_dir).await)
}

fn check_fetch(summary: &FetchSummary) -> Result<(), Box<dyn Error>> {
    if summary.all_succeeded() {
        return Ok(());
    }
    let total = summary.succeeded.len() + summary.failed.len();
    Err(format!(
        "fetched {}/{} categories; failed: {}",
        summary.succeeded.len(),
        total,
        summary.failed.join(", ")
    )
    .into())
}

/// Extract the saved pages and merge them into the feed.
async fn merge_stage(config: &Config, categories: &[Category]) -> Result<(), Box<dyn Error>> {
    match pipeline::run_merge(config, categories).await {
        Ok(summary) => {
            info!(
                documents = summary.documents,
                extracted = summary.extracted,
                duplicates_within = summary.duplicates_within,
                duplicates_across = summary.duplicates_across,
                added = summary.merge.added,
                evicted = summary.merge.evicted,
                total = summary.merge.total,
                feed = %config.feed_path,
                "Feed updated"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, feed = %config.feed_path, "Merge failed; feed left unchanged");
            Err(e)
        }
    }
}
