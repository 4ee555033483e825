use htmlescape::decode_html;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// Feed bytes are not valid UTF-8
    #[error("feed is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    /// Document does not match the RSS 2.0 channel shape
    #[error("feed XML is malformed: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// `<rss><channel>...</channel></rss>`; only the channel matters
#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RawFeed,
}

/// A decoded, text-normalized RSS channel. Transient: items pass through the
/// ingestion pipeline's normalization before anything is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    #[serde(rename = "item")]
    pub items: Vec<RawItem>,
}

/// One `<item>` as it appears in the source, in document order. Missing
/// optional elements are empty strings at this layer, never null; `pub_date`
/// stays a string until the pipeline parses it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    #[serde(rename = "pubDate")]
    pub pub_date: String,
}

/// Decode raw response bytes into a structured, text-normalized feed.
///
/// Malformed XML yields an error and no partial feed. A channel with zero
/// items parses successfully to an empty item list.
pub fn parse(bytes: &[u8]) -> Result<RawFeed, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    let document: RssDocument = quick_xml::de::from_str(text)?;

    let mut feed = document.channel;
    feed.title = unescape_entities(&feed.title);
    feed.description = unescape_entities(&feed.description);
    for item in &mut feed.items {
        item.title = unescape_entities(&item.title);
        item.description = unescape_entities(&item.description);
    }

    Ok(feed)
}

/// HTML-entity unescape, applied unconditionally after structural decode so
/// doubly-escaped source text (`&amp;amp;`) still comes out as plain `&`.
/// Text the decoder rejects (bare ampersands are common) is kept as-is.
fn unescape_entities(text: &str) -> String {
    match decode_html(text) {
        Ok(decoded) => decoded,
        Err(_) => text.to_string(),
    }
}
