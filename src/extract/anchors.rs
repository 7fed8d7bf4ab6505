//! Fallback extraction from rendered article cards.
//!
//! Used only when neither the embedded state nor the pattern matcher found
//! anything. Every `<a href>` pointing at a listing URL is treated as a card:
//! the first heading inside it is the title, the first paragraph the teaser,
//! and any element whose class mentions a date is the publish time.

use super::ExtractOptions;
use crate::models::ArticleRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static HEADING_SELECTORS: Lazy<[Selector; 3]> = Lazy::new(|| {
    [
        Selector::parse("h1").unwrap(),
        Selector::parse("h2").unwrap(),
        Selector::parse("h3").unwrap(),
    ]
});
static PARAGRAPH_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());
static CLASSED_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("[class]").unwrap());
static DATE_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"date|time|publish").unwrap());

/// Whitespace-normalized text content of an element.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `true` if `href` points at `/{segment}/<something>`.
fn is_listing_href(href: &str, segment: &str) -> bool {
    let marker = format!("/{segment}/");
    href.find(&marker)
        .map(|at| &href[at + marker.len()..])
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

fn absolutize(href: &str, base: Option<&Url>) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    base.and_then(|b| b.join(href).ok()).map(|u| u.to_string())
}

/// Collect articles from anchor cards in the rendered markup.
pub fn extract(document: &Html, opts: &ExtractOptions) -> Vec<ArticleRecord> {
    let base = Url::parse(&opts.base_url).ok();
    let mut articles = Vec::new();

    for link in document.select(&LINK_SELECTOR) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if !is_listing_href(href, &opts.listing_segment) {
            continue;
        }
        let Some(url) = absolutize(href, base.as_ref()) else {
            debug!(%href, "Could not resolve anchor href");
            continue;
        };

        let title = HEADING_SELECTORS
            .iter()
            .find_map(|selector| link.select(selector).next())
            .map(element_text)
            .unwrap_or_default();
        if !opts.is_valid_title(&title) {
            continue;
        }

        let description = link
            .select(&PARAGRAPH_SELECTOR)
            .next()
            .map(element_text)
            .unwrap_or_default();
        let published_at = link
            .select(&CLASSED_SELECTOR)
            .find(|el| {
                el.value()
                    .attr("class")
                    .is_some_and(|class| DATE_CLASS.is_match(class))
            })
            .map(element_text)
            .unwrap_or_default();
        let image_url = link
            .select(&IMAGE_SELECTOR)
            .next()
            .and_then(|img| img.value().attr("src"))
            .unwrap_or_default();

        articles.push(opts.record(url, &title, &description, &published_at, image_url));
    }

    info!(accepted = articles.len(), "Scanned anchor cards");
    articles
}
