//! Data models for extracted articles and the persisted RSS feed.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticleRecord`]: One article recovered from a category page
//! - [`FeedDocument`]: The RSS 2.0 document kept on disk between runs
//! - [`Channel`], [`FeedItem`], [`Enclosure`]: The pieces of a `FeedDocument`
//! - [`XmlElement`]: Any other feed element, kept verbatim across rewrites
//!
//! Reading and writing the feed lives in [`crate::outputs::rss`].

/// An article recovered from a category listing page.
///
/// `url` is the dedup key: it is unique within one extraction pass and,
/// after canonicalization, within the persisted feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    /// Absolute link to the article, built from the base URL and the slug.
    pub url: String,
    /// Human-readable headline.
    pub title: String,
    /// Summary text, already truncated. May be empty.
    pub description: String,
    /// Source timestamp, passed through verbatim when present.
    pub published_at: Option<String>,
    /// Thumbnail reference.
    pub image_url: Option<String>,
}

/// The persisted feed: `<rss version="2.0"><channel>…</channel></rss>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub version: String,
    /// Other `<rss>` attributes, namespace declarations included.
    pub attributes: Vec<(String, String)>,
    pub channel: Channel,
}

impl FeedDocument {
    /// Create an empty feed carrying the given channel metadata.
    pub fn fresh(title: &str, link: &str, description: &str) -> Self {
        Self {
            version: "2.0".to_string(),
            attributes: Vec::new(),
            channel: Channel {
                title: title.to_string(),
                link: link.to_string(),
                description: description.to_string(),
                ..Channel::default()
            },
        }
    }
}

/// Channel metadata followed by the stored items in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Channel children other than the three fields above and the items
    /// (`language`, `lastBuildDate`, `atom:link`, …), in document order.
    pub extra: Vec<XmlElement>,
    pub items: Vec<FeedItem>,
}

/// A single `<item>` of the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: Option<String>,
    pub enclosure: Option<Enclosure>,
    /// Item children this crate does not interpret (`guid`, `category`, …).
    pub extra: Vec<XmlElement>,
}

/// `<enclosure url="…" type="…"/>` carrying the article thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
    /// Remaining attributes such as `length`.
    pub attributes: Vec<(String, String)>,
}

impl Enclosure {
    pub fn new(url: &str, mime_type: &str) -> Self {
        Self {
            url: url.to_string(),
            mime_type: mime_type.to_string(),
            attributes: Vec::new(),
        }
    }
}

/// A generic XML element: name, attributes in source order, and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, prefix included (`atom:link`).
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// Content of an [`XmlElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data.
    Text(String),
    CData(String),
}

impl XmlNode {
    /// Whitespace-only text, i.e. indentation between elements.
    pub fn is_blank(&self) -> bool {
        matches!(self, XmlNode::Text(t) if t.trim().is_empty())
    }
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text and CDATA content, trimmed. Child elements are ignored.
    pub fn text(&self) -> String {
        let joined: String = self
            .children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) | XmlNode::CData(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect();
        joined.trim().to_string()
    }

    /// Append character data, merging with a preceding text node.
    pub fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_feed_is_empty() {
        let feed = FeedDocument::fresh("Title", "https://example.com", "Desc");
        assert_eq!(feed.version, "2.0");
        assert_eq!(feed.channel.title, "Title");
        assert_eq!(feed.channel.link, "https://example.com");
        assert!(feed.channel.items.is_empty());
        assert!(feed.channel.extra.is_empty());
    }

    #[test]
    fn test_element_text_merges_fragments() {
        let mut element = XmlElement::new("title");
        element.push_text("  Tom ");
        element.push_text("&");
        element.push_text(" Jerry");
        element.children.push(XmlNode::CData(" <live> ".to_string()));
        assert_eq!(element.children.len(), 2);
        assert_eq!(element.text(), "Tom & Jerry <live>");
    }

    #[test]
    fn test_attribute_lookup() {
        let mut element = XmlElement::new("atom:link");
        element.attributes.push(("href".to_string(), "https://example.com/feed".to_string()));
        element.attributes.push(("rel".to_string(), "self".to_string()));
        assert_eq!(element.attribute("rel"), Some("self"));
        assert_eq!(element.attribute("type"), None);
    }

    #[test]
    fn test_blank_nodes() {
        assert!(XmlNode::Text("\n    ".to_string()).is_blank());
        assert!(!XmlNode::Text(" x ".to_string()).is_blank());
        assert!(!XmlNode::CData(String::new()).is_blank());
    }
}
