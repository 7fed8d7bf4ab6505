//! Utility functions for string handling, timestamps, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Character-aware truncation for log previews and feed descriptions
//! - The small string predicates used when validating extracted fields
//! - RFC-822 style timestamps for generated `pubDate` values
//! - File system validation for output directories

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Marker appended to truncated descriptions.
pub const ELLIPSIS: &str = "...";

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended. Counting is done on characters, so
/// multi-byte text (Bengali headlines, for instance) never splits a code point.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Truncate a description to at most `max` characters.
///
/// When the text is longer than `max`, the first `max - 3` characters are
/// kept and [`ELLIPSIS`] is appended, so the result is exactly `max`
/// characters long. A `max` too small for the ellipsis keeps only as many
/// dots as fit.
pub fn truncate_description(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= ELLIPSIS.len() {
        return ELLIPSIS[..max].to_string();
    }
    let keep = max - ELLIPSIS.len();
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// `true` for non-empty strings made only of numeric characters.
///
/// Unicode digits count too; Bengali pages sometimes carry `০১২` style numbers.
pub fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(char::is_numeric)
}

/// `true` if the text looks like a link rather than a headline.
pub fn looks_like_url(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("www.")
        || lower.contains("://")
}

/// Format a timestamp as `Weekday, DD Mon YYYY HH:MM:SS +0000`.
pub fn rfc822_timestamp(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "আমাদের সময়";
        let result = truncate_for_log(s, 3);
        assert!(result.starts_with("আমা"));
    }

    #[test]
    fn test_truncate_description_long() {
        let s = "x".repeat(350);
        let result = truncate_description(&s, 300);
        assert_eq!(result.chars().count(), 300);
        assert!(result.ends_with("..."));
        assert_eq!(&result[..297], "x".repeat(297));
    }

    #[test]
    fn test_truncate_description_exact_and_short() {
        let exact = "y".repeat(300);
        assert_eq!(truncate_description(&exact, 300), exact);
        assert_eq!(truncate_description("short", 300), "short");
    }

    #[test]
    fn test_truncate_description_tiny_limit() {
        assert_eq!(truncate_description("headline", 2), "..");
        assert_eq!(truncate_description("headline", 3), "...");
        assert_eq!(truncate_description("headline", 0), "");
        assert_eq!(truncate_description("headline", 4), "h...");
    }

    #[test]
    fn test_truncate_description_counts_characters() {
        let s = "মত".repeat(200);
        let result = truncate_description(&s, 300);
        assert_eq!(result.chars().count(), 300);
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("12345"));
        assert!(is_numeric("২০২৪"));
        assert!(!is_numeric(""));
        assert!(!is_numeric("019aabcdefg"));
    }

    #[test]
    fn test_looks_like_url() {
        assert!(looks_like_url("https://example.com/a"));
        assert!(looks_like_url("HTTP://EXAMPLE.COM"));
        assert!(looks_like_url("www.example.com"));
        assert!(!looks_like_url("A Long Enough Headline Text"));
    }

    #[test]
    fn test_rfc822_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 8, 5, 9).unwrap();
        assert_eq!(rfc822_timestamp(ts), "Mon, 01 Jan 2024 08:05:09 +0000");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let dir = std::env::temp_dir().join(format!("shomoy_feed_utils_{}", std::process::id()));
        let nested = dir.join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
