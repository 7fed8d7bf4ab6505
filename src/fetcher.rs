//! Category page fetching through FlareSolverr.
//!
//! The site sits behind a browser challenge, so pages are requested from a
//! [FlareSolverr](https://github.com/FlareSolverr/FlareSolverr) instance which
//! renders them in a headless browser and returns the final HTML:
//!
//! ```text
//! POST http://localhost:8191/v1
//! {"cmd": "request.get", "url": "https://…/category/all/opinion", "maxTimeout": 60000}
//! ```
//!
//! Each category's HTML is written to `<html_dir>/<name>.html`. Failed fetches
//! are logged and reported; they do not stop the remaining categories.

use crate::config::Category;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Serialize)]
struct SolverRequest<'a> {
    cmd: &'a str,
    url: &'a str,
    #[serde(rename = "maxTimeout")]
    max_timeout: u64,
}

/// Reply from the FlareSolverr `/v1` endpoint.
#[derive(Debug, Deserialize)]
pub struct SolverResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub solution: Option<Solution>,
}

#[derive(Debug, Deserialize)]
pub struct Solution {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub response: Option<String>,
}

impl SolverResponse {
    /// The rendered HTML, or an error describing why there is none.
    pub fn into_html(self) -> Result<String, Box<dyn Error>> {
        if let Some(e) = self.error {
            return Err(format!("FlareSolverr error: {e}").into());
        }
        if !self.status.is_empty() && !self.status.eq_ignore_ascii_case("ok") {
            return Err(format!("FlareSolverr status {}: {}", self.status, self.message).into());
        }
        self.solution
            .and_then(|s| s.response)
            .filter(|html| !html.trim().is_empty())
            .ok_or_else(|| Box::<dyn Error>::from("invalid FlareSolverr response: no solution"))
    }
}

/// Minimal client for a FlareSolverr instance.
#[derive(Debug, Clone)]
pub struct SolverClient {
    http: Client,
    endpoint: String,
    max_timeout_ms: u64,
}

impl SolverClient {
    /// Build a client. The HTTP timeout leaves headroom over `max_timeout_ms`,
    /// since FlareSolverr itself enforces that limit on the browser.
    pub fn new(endpoint: &str, max_timeout_ms: u64) -> Result<Self, Box<dyn Error>> {
        let http = Client::builder()
            .timeout(Duration::from_millis(max_timeout_ms) + Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            max_timeout_ms,
        })
    }

    /// Render `url` through FlareSolverr and return the page HTML.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_html(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let request = SolverRequest {
            cmd: "request.get",
            url,
            max_timeout: self.max_timeout_ms,
        };
        let reply: SolverResponse = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;
        if let Some(solution) = &reply.solution {
            debug!(final_url = %solution.url, status = solution.status, "FlareSolverr solution");
        }
        reply.into_html()
    }
}

/// Which categories were saved and which failed.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetch one category and save its HTML into `html_dir`.
#[instrument(level = "info", skip_all, fields(category = %category.name))]
async fn fetch_category(
    client: &SolverClient,
    category: &Category,
    html_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let html = client.fetch_html(&category.url).await?;
    let path = category.html_path(html_dir);
    fs::write(&path, html.as_bytes()).await?;
    info!(path = %path.display(), bytes = html.len(), "Saved category page");
    Ok(())
}

/// Fetch every category in order. Failures are logged and collected.
#[instrument(level = "info", skip_all, fields(count = categories.len()))]
pub async fn fetch_categories(
    client: &SolverClient,
    categories: &[Category],
    html_dir: &Path,
) -> FetchSummary {
    let outcomes: Vec<(String, bool)> = stream::iter(categories)
        .then(|category| async move {
            match fetch_category(client, category, html_dir).await {
                Ok(()) => (category.name.clone(), true),
                Err(e) => {
                    error!(category = %category.name, url = %category.url, error = %e, "Fetch failed");
                    (category.name.clone(), false)
                }
            }
        })
        .collect()
        .await;

    let mut summary = FetchSummary::default();
    for (name, ok) in outcomes {
        if ok {
            summary.succeeded.push(name);
        } else {
            summary.failed.push(name);
        }
    }
    info!(
        succeeded = summary.succeeded.len(),
        total = categories.len(),
        "Completed fetching"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = SolverRequest {
            cmd: "request.get",
            url: "https://example.com",
            max_timeout: 60000,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cmd": "request.get", "url": "https://example.com", "maxTimeout": 60000})
        );
    }

    #[test]
    fn test_successful_reply() {
        let raw = r#"{
            "status": "ok",
            "message": "Challenge not detected!",
            "solution": {"url": "https://example.com", "status": 200, "response": "<html>ok</html>"}
        }"#;
        let reply: SolverResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(reply.into_html().unwrap(), "<html>ok</html>");
    }

    #[test]
    fn test_error_reply() {
        let raw = r#"{"status": "error", "message": "Timeout after 60.0 seconds."}"#;
        let reply: SolverResponse = serde_json::from_str(raw).unwrap();
        let err = reply.into_html().unwrap_err();
        assert!(err.to_string().contains("Timeout"));
    }

    #[test]
    fn test_non_ok_status_is_rejected() {
        let raw = r#"{
            "status": "warning",
            "message": "Challenge detected but not solved",
            "solution": {"url": "https://example.com", "status": 403, "response": "<html>blocked</html>"}
        }"#;
        let reply: SolverResponse = serde_json::from_str(raw).unwrap();
        let err = reply.into_html().unwrap_err().to_string();
        assert!(err.contains("warning"));
    }

    #[test]
    fn test_error_field() {
        let raw = r#"{"error": "boom"}"#;
        let reply: SolverResponse = serde_json::from_str(raw).unwrap();
        assert!(reply.into_html().unwrap_err().to_string().contains("boom"));
    }

    #[test]
    fn test_missing_solution() {
        let raw = r#"{"status": "ok", "message": ""}"#;
        let reply: SolverResponse = serde_json::from_str(raw).unwrap();
        assert!(reply.into_html().is_err());
    }

    #[test]
    fn test_summary() {
        let mut summary = FetchSummary::default();
        assert!(summary.all_succeeded());
        summary.failed.push("opinion".to_string());
        assert!(!summary.all_succeeded());
    }
}
