//! Parsed source documents.
//!
//! RSS 2.0 is read directly with `quick-xml` so that podcast fields
//! (`itunes:duration`, `itunes:image`, a missing `<guid>`) arrive exactly as
//! written. Every other dialect the generic `feed-rs` parser understands
//! (Atom, RSS 1.0, JSON Feed) is mapped into the same shape.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::normalize::{Artwork, ArtworkField};
use crate::util::strip_html;

/// Nesting limit for source documents.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("Document nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("RSS document has no <channel>")]
    MissingChannel,
    #[error("Not a recognised feed document: {0}")]
    Unrecognised(String),
}

/// The native identifier of an entry as it appeared in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EntryId {
    #[default]
    Absent,
    Text(String),
    /// An identifier element that carried attributes (`<guid isPermaLink="false">`).
    /// `value` is the element text, `content` a `content` attribute when present.
    Structured {
        value: Option<String>,
        content: Option<String>,
    },
}

impl EntryId {
    /// Reduces the identifier to its primary text, `None` if absent or blank.
    ///
    /// Structured identifiers use their text first, then `content`.
    pub fn primary_text(&self) -> Option<&str> {
        let candidate = match self {
            EntryId::Absent => None,
            EntryId::Text(s) => Some(s.as_str()),
            EntryId::Structured { value, content } => value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .or(content.as_deref()),
        };
        candidate.map(str::trim).filter(|s| !s.is_empty())
    }
}

/// One entry of a source document, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceEntry {
    pub id: EntryId,
    pub title: Option<String>,
    pub pub_date: Option<String>,
    /// Rich content (`content:encoded`, else `description`).
    pub content: Option<String>,
    /// Plain-text rendering of `content`.
    pub content_snippet: Option<String>,
    /// `itunes:summary` or Atom `summary`.
    pub summary: Option<String>,
    /// Raw duration text (`itunes:duration`).
    pub duration: Option<String>,
    pub artwork: Artwork,
    /// URL of the first enclosure.
    pub enclosure_url: Option<String>,
}

/// A whole parsed feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDocument {
    pub title: Option<String>,
    pub description: Option<String>,
    pub artwork: Artwork,
    pub entries: Vec<SourceEntry>,
}

/// Parses raw feed bytes into a [`SourceDocument`].
///
/// Documents rooted at `<rss>` go through the podcast-aware reader; anything
/// else is handed to `feed-rs`.
pub fn parse_document(bytes: &[u8]) -> Result<SourceDocument, ParseError> {
    if let Some(doc) = parse_rss(bytes)? {
        return Ok(doc);
    }

    // An empty generated id leaves the entry id absent, so the caller derives it
    let feed = feed_rs::parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(bytes)
        .map_err(|e| ParseError::Unrecognised(e.to_string()))?;
    Ok(from_generic(feed))
}

// ============================================================================
// RSS 2.0
// ============================================================================

/// Element paths the reader assigns text to.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    Channel,
    ChannelImage,
    Item,
}

#[derive(Default)]
struct ItemFields {
    entry: SourceEntry,
    description: Option<String>,
    encoded: Option<String>,
}

impl ItemFields {
    fn finish(self) -> SourceEntry {
        let mut entry = self.entry;
        entry.content = self.encoded.or(self.description);
        entry.content_snippet = entry.content.as_deref().map(strip_html);
        entry
    }
}

/// Reads an RSS 2.0 document. Returns `Ok(None)` when the root element is not
/// `<rss>` so the caller can try other dialects.
fn parse_rss(bytes: &[u8]) -> Result<Option<SourceDocument>, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut doc = SourceDocument::default();
    let mut saw_root = false;
    let mut saw_channel = false;
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut item: Option<ItemFields> = None;
    let mut channel_image_url: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| ParseError::Xml(e.to_string()))?
        {
            Event::Start(e) => {
                let name = qualified_name(&e);
                if stack.is_empty() {
                    if name != "rss" {
                        return Ok(None);
                    }
                    saw_root = true;
                }
                stack.push(name);
                // Reject pathological nesting before it costs memory
                if stack.len() > MAX_DEPTH {
                    return Err(ParseError::TooDeep(MAX_DEPTH));
                }
                text.clear();

                if scope(&stack) == Some(Scope::Channel) {
                    match leaf(&stack) {
                        "channel" => saw_channel = true,
                        "item" => item = Some(ItemFields::default()),
                        _ => {}
                    }
                }
                apply_attributes(&e, &reader, &stack, &mut doc, item.as_mut())?;
            }
            Event::Empty(e) => {
                if stack.is_empty() {
                    return Ok(None);
                }
                stack.push(qualified_name(&e));
                match (scope(&stack), leaf(&stack)) {
                    (Some(Scope::Channel), "channel") if stack.len() == 2 => saw_channel = true,
                    (Some(Scope::Channel), "item") => doc.entries.push(SourceEntry::default()),
                    _ => apply_attributes(&e, &reader, &stack, &mut doc, item.as_mut())?,
                }
                stack.pop();
            }
            Event::Text(t) => {
                let chunk = t
                    .unescape()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                text.push_str(&chunk);
            }
            Event::CData(c) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(_) => {
                let value = std::mem::take(&mut text);
                match scope(&stack) {
                    Some(Scope::Item) => {
                        if let Some(fields) = item.as_mut() {
                            assign_item_text(fields, leaf(&stack), value);
                        }
                    }
                    Some(Scope::Channel) if leaf(&stack) == "item" => {
                        if let Some(fields) = item.take() {
                            doc.entries.push(fields.finish());
                        }
                    }
                    Some(Scope::Channel) => assign_channel_text(&mut doc, leaf(&stack), value),
                    Some(Scope::ChannelImage) if leaf(&stack) == "url" => {
                        channel_image_url = non_blank(value);
                    }
                    _ => {}
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Ok(None);
    }
    if !stack.is_empty() {
        return Err(ParseError::Xml(format!(
            "unexpected end of document inside <{}>",
            leaf(&stack)
        )));
    }
    if !saw_channel {
        return Err(ParseError::MissingChannel);
    }

    // <image><url> only applies when <image> had no text of its own
    if let Some(url) = channel_image_url {
        if doc.artwork.image == ArtworkField::Absent {
            doc.artwork.image = ArtworkField::Structured {
                href: None,
                url: Some(url),
            };
        }
    }

    Ok(Some(doc))
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn leaf(stack: &[String]) -> &str {
    stack.last().map(String::as_str).unwrap_or_default()
}

/// Classifies the innermost element by its parent: `rss/channel/*`,
/// `rss/channel/image/*` or `rss/channel/item/*`.
fn scope(stack: &[String]) -> Option<Scope> {
    match stack.len() {
        2 | 3 if stack[1] == "channel" => Some(Scope::Channel),
        4 if stack[1] == "channel" && stack[2] == "item" => Some(Scope::Item),
        4 if stack[1] == "channel" && stack[2] == "image" => Some(Scope::ChannelImage),
        _ => None,
    }
}

fn assign_channel_text(doc: &mut SourceDocument, name: &str, value: String) {
    match name {
        "title" => doc.title = non_blank(value),
        "description" => doc.description = non_blank(value),
        "itunes:summary" if doc.description.is_none() => doc.description = non_blank(value),
        "itunes:image" if doc.artwork.itunes_image == ArtworkField::Absent => {
            if let Some(v) = non_blank(value) {
                doc.artwork.itunes_image = ArtworkField::Text(v);
            }
        }
        "image" => {
            if let Some(v) = non_blank(value) {
                doc.artwork.image = ArtworkField::Text(v);
            }
        }
        _ => {}
    }
}

fn assign_item_text(fields: &mut ItemFields, name: &str, value: String) {
    let entry = &mut fields.entry;
    match name {
        "title" => entry.title = Some(value),
        "pubDate" => entry.pub_date = non_blank(value),
        "guid" => {
            entry.id = match std::mem::take(&mut entry.id) {
                EntryId::Structured { content, .. } => EntryId::Structured {
                    value: Some(value),
                    content,
                },
                _ => EntryId::Text(value),
            }
        }
        "description" => fields.description = non_blank(value),
        "content:encoded" => fields.encoded = non_blank(value),
        "itunes:summary" => entry.summary = non_blank(value),
        "itunes:duration" => entry.duration = non_blank(value),
        "itunes:image" if entry.artwork.itunes_image == ArtworkField::Absent => {
            if let Some(v) = non_blank(value) {
                entry.artwork.itunes_image = ArtworkField::Text(v);
            }
        }
        "image" => {
            if let Some(v) = non_blank(value) {
                entry.artwork.image = ArtworkField::Text(v);
            }
        }
        _ => {}
    }
}

/// Handles the attribute-carrying elements: `itunes:image`, `enclosure`
/// and `guid`.
fn apply_attributes(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    stack: &[String],
    doc: &mut SourceDocument,
    item: Option<&mut ItemFields>,
) -> Result<(), ParseError> {
    let name = leaf(stack);
    match (scope(stack), name) {
        (Some(Scope::Channel), "itunes:image") => {
            if let Some(href) = attribute(e, reader, b"href")? {
                doc.artwork.itunes_image = ArtworkField::Structured {
                    href: Some(href),
                    url: None,
                };
            }
        }
        (Some(Scope::Item), _) => {
            let Some(fields) = item else { return Ok(()) };
            let entry = &mut fields.entry;
            match name {
                "itunes:image" => {
                    if let Some(href) = attribute(e, reader, b"href")? {
                        entry.artwork.itunes_image = ArtworkField::Structured {
                            href: Some(href),
                            url: None,
                        };
                    }
                }
                "enclosure" if entry.enclosure_url.is_none() => {
                    entry.enclosure_url = attribute(e, reader, b"url")?;
                }
                "guid" if e.attributes().next().is_some() => {
                    entry.id = EntryId::Structured {
                        value: None,
                        content: attribute(e, reader, b"content")?,
                    };
                }
                _ => {}
            }
        }
        _ => {}
    }
    Ok(())
}

fn attribute(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    key: &[u8],
) -> Result<Option<String>, ParseError> {
    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping malformed feed attribute");
                continue;
            }
        };
        if attr.key.as_ref() == key {
            let value = attr
                .decode_and_unescape_value(reader.decoder())
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            return Ok(non_blank(value));
        }
    }
    Ok(None)
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

// ============================================================================
// Other dialects (feed-rs)
// ============================================================================

fn from_generic(feed: feed_rs::model::Feed) -> SourceDocument {
    let image = feed
        .logo
        .or(feed.icon)
        .map(|img| ArtworkField::Structured {
            href: None,
            url: Some(img.uri),
        })
        .unwrap_or_default();

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let content = entry.content.and_then(|c| c.body).and_then(non_blank);
            let thumbnail = entry
                .media
                .iter()
                .flat_map(|m| m.thumbnails.iter())
                .map(|t| t.image.uri.clone())
                .next();
            let enclosure_url = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref() == Some("enclosure"))
                .map(|l| l.href.clone())
                .or_else(|| {
                    entry
                        .media
                        .iter()
                        .flat_map(|m| m.content.iter())
                        .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
                });
            let duration = entry
                .media
                .iter()
                .find_map(|m| m.duration)
                .map(|d| d.as_secs().to_string());

            SourceEntry {
                id: if entry.id.trim().is_empty() {
                    EntryId::Absent
                } else {
                    EntryId::Text(entry.id)
                },
                title: entry.title.map(|t| t.content),
                pub_date: entry.published.or(entry.updated).map(|d| d.to_rfc2822()),
                content_snippet: content.as_deref().map(strip_html),
                content,
                summary: entry.summary.map(|t| t.content).and_then(non_blank),
                duration,
                artwork: Artwork {
                    itunes_image: ArtworkField::Absent,
                    image: thumbnail.map(ArtworkField::Text).unwrap_or_default(),
                },
                enclosure_url,
            }
        })
        .collect();

    SourceDocument {
        title: feed.title.map(|t| t.content),
        description: feed.description.map(|t| t.content),
        artwork: Artwork {
            itunes_image: ArtworkField::Absent,
            image,
        },
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PODCAST_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
     xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>AI Odyssey</title>
    <description>A journey through artificial intelligence.</description>
    <itunes:image href="https://cdn.example.com/show.jpg"/>
    <image><url>https://cdn.example.com/channel.png</url></image>
    <item>
      <title>OpenClaw: The Lobster That Wants to Run Your Life</title>
      <guid isPermaLink="false">999ecd09-dab3-4c97-9fd6-57ef2611883a</guid>
      <pubDate>Sat, 31 Jan 2026 23:50:39 GMT</pubDate>
      <description>Plain description</description>
      <content:encoded><![CDATA[<p>Remember when Siri was supposed to change everything?</p>]]></content:encoded>
      <itunes:duration>00:13:19</itunes:duration>
      <itunes:image href="https://cdn.example.com/ep1.jpg"/>
      <enclosure url="https://cdn.example.com/ep1.m4a" type="audio/x-m4a" length="1"/>
      <enclosure url="https://cdn.example.com/ep1-alt.mp3" type="audio/mpeg" length="1"/>
    </item>
    <item>
      <title>No guid here</title>
      <pubDate>Fri, 30 Jan 2026 10:00:00 GMT</pubDate>
      <itunes:summary>Only a summary</itunes:summary>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_rss_channel_fields() {
        let doc = parse_document(PODCAST_RSS.as_bytes()).unwrap();
        assert_eq!(doc.title.as_deref(), Some("AI Odyssey"));
        assert_eq!(
            doc.description.as_deref(),
            Some("A journey through artificial intelligence.")
        );
        assert_eq!(
            doc.artwork.itunes_image,
            ArtworkField::Structured {
                href: Some("https://cdn.example.com/show.jpg".into()),
                url: None
            }
        );
        assert_eq!(
            doc.artwork.image,
            ArtworkField::Structured {
                href: None,
                url: Some("https://cdn.example.com/channel.png".into())
            }
        );
        assert_eq!(doc.entries.len(), 2);
    }

    #[test]
    fn test_rss_item_fields() {
        let doc = parse_document(PODCAST_RSS.as_bytes()).unwrap();
        let first = &doc.entries[0];
        assert_eq!(
            first.id.primary_text(),
            Some("999ecd09-dab3-4c97-9fd6-57ef2611883a")
        );
        assert!(matches!(first.id, EntryId::Structured { .. }));
        assert_eq!(
            first.content.as_deref(),
            Some("<p>Remember when Siri was supposed to change everything?</p>")
        );
        assert_eq!(
            first.content_snippet.as_deref(),
            Some("Remember when Siri was supposed to change everything?")
        );
        assert_eq!(first.duration.as_deref(), Some("00:13:19"));
        assert_eq!(
            first.enclosure_url.as_deref(),
            Some("https://cdn.example.com/ep1.m4a")
        );
        assert_eq!(
            first.artwork.itunes_image,
            ArtworkField::Structured {
                href: Some("https://cdn.example.com/ep1.jpg".into()),
                url: None
            }
        );

        let second = &doc.entries[1];
        assert_eq!(second.id, EntryId::Absent);
        assert_eq!(second.content, None);
        assert_eq!(second.summary.as_deref(), Some("Only a summary"));
        assert_eq!(second.enclosure_url, None);
    }

    #[test]
    fn test_description_used_when_no_encoded_content() {
        let rss = r#"<rss><channel><title>T</title>
            <item><title>A</title><description>&lt;b&gt;bold&lt;/b&gt; words</description></item>
        </channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.entries[0].content.as_deref(), Some("<b>bold</b> words"));
        assert_eq!(doc.entries[0].content_snippet.as_deref(), Some("bold words"));
    }

    #[test]
    fn test_blank_guid_is_not_an_identifier() {
        let rss = r#"<rss><channel><item><guid>   </guid><title>A</title></item></channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.entries[0].id.primary_text(), None);
    }

    #[test]
    fn test_structured_id_falls_back_to_content() {
        let id = EntryId::Structured {
            value: Some("".into()),
            content: Some("tag:example.com,2026:1".into()),
        };
        assert_eq!(id.primary_text(), Some("tag:example.com,2026:1"));
    }

    #[test]
    fn test_items_without_optional_fields_are_kept() {
        let rss = r#"<rss><channel><item/><item></item></channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.entries.len(), 2);

        let rss = r#"<rss><channel><item></item><item><title/></item></channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.entries.len(), 2);
        assert_eq!(doc.entries[0], SourceEntry::default());
    }

    #[test]
    fn test_itunes_image_as_text() {
        let rss = r#"<rss><channel><itunes:image>https://cdn.example.com/t.jpg</itunes:image></channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(
            doc.artwork.itunes_image,
            ArtworkField::Text("https://cdn.example.com/t.jpg".into())
        );
    }

    #[test]
    fn test_atom_via_generic_parser() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Show</title>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2026-01-01T00:00:00Z</updated>
  <logo>https://cdn.example.com/logo.png</logo>
  <entry>
    <title>Atom Episode</title>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2026-01-02T03:04:05Z</updated>
    <summary>Short summary</summary>
    <link rel="enclosure" href="https://cdn.example.com/atom.mp3" type="audio/mpeg"/>
  </entry>
</feed>"#;
        let doc = parse_document(atom.as_bytes()).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Atom Show"));
        assert_eq!(
            doc.artwork.image,
            ArtworkField::Structured {
                href: None,
                url: Some("https://cdn.example.com/logo.png".into())
            }
        );
        let entry = &doc.entries[0];
        assert_eq!(
            entry.id.primary_text(),
            Some("urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a")
        );
        assert_eq!(entry.title.as_deref(), Some("Atom Episode"));
        assert_eq!(entry.summary.as_deref(), Some("Short summary"));
        assert_eq!(
            entry.enclosure_url.as_deref(),
            Some("https://cdn.example.com/atom.mp3")
        );
        assert!(entry.pub_date.is_some());
    }

    #[test]
    fn test_malformed_documents_fail() {
        assert!(parse_document(b"<not valid xml").is_err());
        assert!(parse_document(b"").is_err());
        assert!(parse_document(b"<html><body>hello</body></html>").is_err());
        assert!(parse_document(b"<rss><channel><item><title>cut").is_err());
    }

    #[test]
    fn test_empty_channel_has_no_entries() {
        let doc = parse_document(b"<rss version=\"2.0\"><channel/></rss>").unwrap();
        assert_eq!(doc, SourceDocument::default());
    }

    #[test]
    fn test_bare_ampersand_in_attribute_is_kept() {
        let rss = r#"<rss><channel><item>
            <enclosure url="https://cdn.example.com/a.mp3?x=1&y=2" type="audio/mpeg"/>
        </item></channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(
            doc.entries[0].enclosure_url.as_deref(),
            Some("https://cdn.example.com/a.mp3?x=1&y=2")
        );
    }

    #[test]
    fn test_generic_entry_without_id_is_absent() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Show</title>
  <updated>2026-01-01T00:00:00Z</updated>
  <entry>
    <title>No id</title>
    <link href="https://example.com/episodes/1"/>
    <updated>2026-01-02T03:04:05Z</updated>
  </entry>
</feed>"#;
        let doc = parse_document(atom.as_bytes()).unwrap();
        assert_eq!(doc.entries[0].id, EntryId::Absent);
    }

    #[test]
    fn test_rss_without_channel_fails() {
        assert!(matches!(
            parse_document(b"<rss version=\"2.0\"></rss>"),
            Err(ParseError::MissingChannel)
        ));
    }
}
