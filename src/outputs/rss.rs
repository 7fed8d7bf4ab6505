//! Reading and writing the RSS feed file.
//!
//! The feed is read into a [`FeedDocument`] with a `quick_xml::Reader` event
//! walk. Elements the merge does not interpret are kept as [`XmlElement`]s and
//! written back unchanged, so a feed edited by other tools survives a rewrite.
//!
//! The feed is always rewritten wholesale. Writes go to a sibling temporary
//! file which is then renamed over the target, so a failed run leaves the
//! previous feed intact:
//!
//! ```text
//! feed_dir/
//! ├── articles.xml               # current feed
//! └── .articles.xml.tmp-1a2b3c4d # only while a write is in flight
//! ```

use crate::config::ChannelConfig;
use crate::models::{Channel, Enclosure, FeedDocument, FeedItem, XmlElement, XmlNode};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesRef, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use rand::{Rng, rng};
use std::error::Error;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Declaration written at the top of every feed.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Load the feed at `path`, or start a fresh one.
///
/// A missing file, bytes that are not UTF-8, or content that is not a
/// well-formed RSS document yield an empty feed with the configured channel
/// metadata; the unusable content is discarded.
///
/// # Errors
///
/// Returns an error only if the file exists but cannot be read.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_feed(path: &Path, channel: &ChannelConfig) -> Result<FeedDocument, Box<dyn Error>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No existing feed; starting a fresh one");
            return Ok(fresh_feed(channel));
        }
        Err(e) => {
            error!(error = %e, "Failed to read existing feed");
            return Err(e.into());
        }
    };

    let parsed = String::from_utf8(bytes)
        .map_err(Box::<dyn Error>::from)
        .and_then(|raw| parse_feed(&raw));
    Ok(parsed.unwrap_or_else(|e| {
        warn!(error = %e, "Existing feed is malformed; starting a fresh one");
        fresh_feed(channel)
    }))
}

/// Parse feed XML.
///
/// # Errors
///
/// Returns an error if the text is not well-formed XML, the root is not
/// `<rss>`, or the root has no `<channel>`.
pub fn parse_feed(raw: &str) -> Result<FeedDocument, Box<dyn Error>> {
    let root = read_document(raw.trim_start_matches('\u{feff}'))?;
    if root.name != "rss" {
        return Err(format!("root element is <{}>, expected <rss>", root.name).into());
    }

    let mut version = None;
    let mut attributes = Vec::new();
    for (key, value) in root.attributes {
        if key == "version" {
            version = Some(value);
        } else {
            attributes.push((key, value));
        }
    }

    let channel = root
        .children
        .into_iter()
        .find_map(|node| match node {
            XmlNode::Element(e) if e.name == "channel" => Some(e),
            _ => None,
        })
        .ok_or("feed has no <channel>")?;

    let feed = FeedDocument {
        version: version.unwrap_or_else(|| "2.0".to_string()),
        attributes,
        channel: channel_from(channel),
    };
    info!(
        items = feed.channel.items.len(),
        extra = feed.channel.extra.len(),
        "Parsed existing feed"
    );
    Ok(feed)
}

fn read_document(raw: &str) -> Result<XmlElement, Box<dyn Error>> {
    let mut reader = Reader::from_str(raw);
    loop {
        match reader.read_event()? {
            Event::Start(start) => return read_children(&mut reader, element_from(&start)?),
            Event::Empty(start) => return element_from(&start),
            Event::Text(text) if !text.xml_content()?.trim().is_empty() => {
                return Err("text outside the root element".into());
            }
            Event::GeneralRef(_) | Event::CData(_) => {
                return Err("content outside the root element".into());
            }
            Event::Eof => return Err("document has no root element".into()),
            _ => {}
        }
    }
}

fn read_children(reader: &mut Reader<&[u8]>, mut element: XmlElement) -> Result<XmlElement, Box<dyn Error>> {
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let child = read_children(reader, element_from(&start)?)?;
                element.children.push(XmlNode::Element(child));
            }
            Event::Empty(start) => element.children.push(XmlNode::Element(element_from(&start)?)),
            Event::Text(text) => element.push_text(&text.xml_content()?),
            Event::GeneralRef(reference) => element.push_text(&resolve_reference(&reference)?),
            Event::CData(data) => {
                let data = std::str::from_utf8(&data)?.to_string();
                element.children.push(XmlNode::CData(data));
            }
            Event::End(_) => return Ok(element),
            Event::Eof => return Err(format!("unexpected end of input inside <{}>", element.name).into()),
            _ => {}
        }
    }
}

fn element_from(start: &BytesStart) -> Result<XmlElement, Box<dyn Error>> {
    let mut element = XmlElement::new(std::str::from_utf8(start.name().as_ref())?);
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Character references and the five predefined entities resolve; any other
/// entity is kept as written.
fn resolve_reference(reference: &BytesRef) -> Result<String, Box<dyn Error>> {
    if let Some(ch) = reference.resolve_char_ref()? {
        return Ok(ch.to_string());
    }
    let name = reference.decode()?;
    Ok(match resolve_predefined_entity(&name) {
        Some(resolved) => resolved.to_string(),
        None => format!("&{name};"),
    })
}

fn channel_from(element: XmlElement) -> Channel {
    let mut channel = Channel::default();
    for node in element.children {
        let XmlNode::Element(child) = node else {
            continue;
        };
        match child.name.as_str() {
            "title" => channel.title = child.text(),
            "link" => channel.link = child.text(),
            "description" => channel.description = child.text(),
            "item" => channel.items.push(item_from(child)),
            _ => {
                debug!(element = %child.name, "Keeping channel element as is");
                channel.extra.push(child);
            }
        }
    }
    channel
}

fn item_from(element: XmlElement) -> FeedItem {
    let mut item = FeedItem::default();
    for node in element.children {
        let XmlNode::Element(child) = node else {
            continue;
        };
        match child.name.as_str() {
            "title" => item.title = child.text(),
            "link" => item.link = child.text(),
            "description" => item.description = child.text(),
            "pubDate" => item.pub_date = Some(child.text()),
            "enclosure" if item.enclosure.is_none() && child.attribute("url").is_some() => {
                item.enclosure = Some(enclosure_from(child));
            }
            _ => item.extra.push(child),
        }
    }
    item
}

fn enclosure_from(element: XmlElement) -> Enclosure {
    let mut enclosure = Enclosure::new("", "image/jpeg");
    for (key, value) in element.attributes {
        match key.as_str() {
            "url" => enclosure.url = value,
            "type" => enclosure.mime_type = value,
            _ => enclosure.attributes.push((key, value)),
        }
    }
    enclosure
}

fn fresh_feed(channel: &ChannelConfig) -> FeedDocument {
    FeedDocument::fresh(&channel.title, &channel.link, &channel.description)
}

/// Serialize the feed with an XML declaration and two-space indentation.
pub fn render_feed(feed: &FeedDocument) -> Result<String, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", feed.version.as_str()));
    for (key, value) in &feed.attributes {
        rss.push_attribute((key.as_str(), value.as_str()));
    }
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    let channel = &feed.channel;
    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    for element in &channel.extra {
        write_element(&mut writer, element)?;
    }
    for item in &channel.items {
        write_item(&mut writer, item)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut xml = String::from_utf8(writer.into_inner())?;
    xml.push('\n');
    Ok(xml)
}

fn write_item<W: Write>(w: &mut Writer<W>, item: &FeedItem) -> io::Result<()> {
    w.write_event(Event::Start(BytesStart::new("item")))?;
    write_text_element(w, "title", &item.title)?;
    write_text_element(w, "link", &item.link)?;
    write_text_element(w, "description", &item.description)?;
    if let Some(date) = &item.pub_date {
        write_text_element(w, "pubDate", date)?;
    }
    if let Some(enclosure) = &item.enclosure {
        let mut enc = BytesStart::new("enclosure");
        enc.push_attribute(("url", enclosure.url.as_str()));
        enc.push_attribute(("type", enclosure.mime_type.as_str()));
        for (key, value) in &enclosure.attributes {
            enc.push_attribute((key.as_str(), value.as_str()));
        }
        w.write_event(Event::Empty(enc))?;
    }
    for element in &item.extra {
        write_element(w, element)?;
    }
    w.write_event(Event::End(BytesEnd::new("item")))
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))
}

fn write_element<W: Write>(w: &mut Writer<W>, element: &XmlElement) -> io::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let content: Vec<&XmlNode> = element.children.iter().filter(|n| !n.is_blank()).collect();
    if content.is_empty() {
        return w.write_event(Event::Empty(start));
    }

    w.write_event(Event::Start(start))?;
    for node in content {
        match node {
            XmlNode::Element(child) => write_element(w, child)?,
            XmlNode::Text(text) => w.write_event(Event::Text(BytesText::new(text)))?,
            XmlNode::CData(data) => w.write_event(Event::CData(BytesCData::new(data.as_str())))?,
        }
    }
    w.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "feed.xml".to_string());
    let suffix: u32 = rng().random();
    path.with_file_name(format!(".{name}.tmp-{suffix:08x}"))
}

/// Atomically replace the feed at `path`.
///
/// # Errors
///
/// Returns an error if serialization, the temporary write, or the final
/// rename fails. The temporary file is removed on failure.
#[instrument(level = "info", skip_all, fields(path = %path.display(), items = feed.channel.items.len()))]
pub async fn save_feed(path: &Path, feed: &FeedDocument) -> Result<(), Box<dyn Error>> {
    let xml = render_feed(feed)?;
    let tmp = temp_path_for(path);

    if let Err(e) = fs::write(&tmp, xml.as_bytes()).await {
        error!(tmp = %tmp.display(), error = %e, "Failed to write temporary feed");
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        error!(tmp = %tmp.display(), error = %e, "Failed to replace feed");
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    info!(bytes = xml.len(), "Wrote feed");
    Ok(())
}
