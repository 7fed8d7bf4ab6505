//! Output generation for the persisted feed.
//!
//! # Submodules
//!
//! - [`rss`]: Loads the existing RSS file and atomically writes the merged one
//!
//! # Output Structure
//!
//! ```text
//! articles.xml
//! └── <rss version="2.0">
//!     └── <channel>
//!         ├── <title>/<link>/<description>
//!         └── <item>…</item>   # oldest first, at most `max_items`
//! ```

pub mod rss;
