//! Removal of volatile fields before a snapshot is written.
//!
//! Redaction never fails because a target is missing, and applying it twice
//! gives the same result as applying it once.

use std::borrow::Cow;
use std::ops::Range;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::Redaction;
use crate::document::Document;
use crate::feed::xml_tree::{XmlTreeError, UTF8_BOM};

const PUBLISHED: &[&str] = &["published"];
const LAST_BUILD_DATE: &[&str] = &["rss", "channel", "lastBuildDate"];

impl Redaction {
    /// Removes the flagged fields from a document tree.
    pub fn apply(&self, doc: &mut Document) {
        if self.remove_published && doc.remove_path(PUBLISHED).is_some() {
            tracing::debug!("Removed published");
        }
        if self.remove_last_build_date && doc.remove_path(LAST_BUILD_DATE).is_some() {
            tracing::debug!("Removed rss.channel.lastBuildDate");
        }
    }

    /// Applies the byte-level redactions to a raw XML payload.
    ///
    /// Only `lastBuildDate` has a raw form; `published` exists only in the
    /// extracted shape.
    pub fn apply_to_xml<'a>(&self, xml: &'a [u8]) -> Result<Cow<'a, [u8]>, XmlTreeError> {
        if self.remove_last_build_date {
            remove_last_build_date_xml(xml)
        } else {
            Ok(Cow::Borrowed(xml))
        }
    }
}

/// Cuts every `<lastBuildDate>` element sitting directly under `rss/channel`
/// out of a raw XML payload.
///
/// Element boundaries come from a streaming parse, so look-alikes inside
/// CDATA, comments or items are left alone. All other bytes, including the
/// whitespace around the removed element, are kept verbatim.
pub fn remove_last_build_date_xml(xml: &[u8]) -> Result<Cow<'_, [u8]>, XmlTreeError> {
    let ranges = locate(xml, LAST_BUILD_DATE)?;
    if ranges.is_empty() {
        return Ok(Cow::Borrowed(xml));
    }

    let mut out = Vec::with_capacity(xml.len());
    let mut cursor = 0;
    for range in &ranges {
        out.extend_from_slice(&xml[cursor..range.start]);
        cursor = range.end;
    }
    out.extend_from_slice(&xml[cursor..]);

    tracing::debug!(removed = ranges.len(), "Removed lastBuildDate from XML");
    Ok(Cow::Owned(out))
}

/// Byte ranges of every element whose ancestry matches `path` exactly.
///
/// Ranges index into `xml` itself, leading BOM included.
fn locate(xml: &[u8], path: &[&str]) -> Result<Vec<Range<usize>>, XmlTreeError> {
    // The reader skips a BOM without counting it in its positions
    let (offset, body) = match xml.strip_prefix(UTF8_BOM) {
        Some(rest) => (UTF8_BOM.len(), rest),
        None => (0, xml),
    };
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut open: Option<usize> = None;
    let mut ranges = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let end = offset + reader.buffer_position() as usize;
        match event {
            // `<` + content + `>`
            Event::Start(e) => {
                stack.push(e.name().as_ref().to_vec());
                if open.is_none() && matches_path(&stack, path) {
                    open = Some(end.saturating_sub(e.len() + 2));
                }
            }
            // `<` + content + `/>`
            Event::Empty(e) => {
                stack.push(e.name().as_ref().to_vec());
                if open.is_none() && matches_path(&stack, path) {
                    ranges.push(end.saturating_sub(e.len() + 3)..end);
                }
                stack.pop();
            }
            Event::End(_) => {
                if open.is_some() && matches_path(&stack, path) {
                    if let Some(start) = open.take() {
                        ranges.push(start..end);
                    }
                }
                stack.pop().ok_or(XmlTreeError::UnbalancedEnd)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(ranges)
}

fn matches_path(stack: &[Vec<u8>], path: &[&str]) -> bool {
    stack.len() == path.len()
        && stack
            .iter()
            .zip(path)
            .all(|(name, want)| name.as_slice() == want.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::xml_tree::parse_xml_tree;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <lastBuildDate>Mon, 01 Jan 2024 00:00:00 GMT</lastBuildDate>
    <item>
      <title>One</title>
      <lastBuildDate>item-level, kept</lastBuildDate>
    </item>
  </channel>
</rss>"#;

    fn both() -> Redaction {
        Redaction {
            remove_published: true,
            remove_last_build_date: true,
        }
    }

    #[test]
    fn test_remove_published_keeps_siblings() {
        let mut doc = Document::try_from(json!({
            "title": "T",
            "published": "2024-01-01T00:00:00.000Z",
            "entries": []
        }))
        .unwrap();
        both().apply(&mut doc);
        assert_eq!(doc.into_value(), json!({"title": "T", "entries": []}));
    }

    #[test]
    fn test_remove_last_build_date_from_tree() {
        let mut doc = parse_xml_tree(RSS.as_bytes()).unwrap();
        both().apply(&mut doc);
        assert!(doc.get_path(&["rss", "channel", "lastBuildDate"]).is_none());
        assert_eq!(
            doc.get_path(&["rss", "channel", "title"]),
            Some(&json!("Example"))
        );
    }

    #[test]
    fn test_flags_off_is_noop() {
        let mut doc = parse_xml_tree(RSS.as_bytes()).unwrap();
        let before = doc.clone();
        Redaction::default().apply(&mut doc);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_absent_fields_are_noop() {
        let mut doc = Document::try_from(json!({"rss": "not an object"})).unwrap();
        let before = doc.clone();
        both().apply(&mut doc);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_xml_splice_removes_only_channel_element() {
        let out = remove_last_build_date_xml(RSS.as_bytes()).unwrap();
        let out = std::str::from_utf8(&out).unwrap();
        let expected = RSS.replace(
            "<lastBuildDate>Mon, 01 Jan 2024 00:00:00 GMT</lastBuildDate>",
            "",
        );
        assert_eq!(out, expected);
        assert!(out.contains("item-level, kept"));
    }

    #[test]
    fn test_xml_splice_keeps_bom_and_offsets() {
        let body = "<rss><channel><title>T</title><lastBuildDate>D</lastBuildDate><link>L</link></channel></rss>";
        let mut xml = UTF8_BOM.to_vec();
        xml.extend_from_slice(body.as_bytes());

        let out = remove_last_build_date_xml(&xml).unwrap();

        let mut expected = UTF8_BOM.to_vec();
        expected.extend_from_slice(b"<rss><channel><title>T</title><link>L</link></channel></rss>");
        assert_eq!(&*out, expected.as_slice());
    }

    #[test]
    fn test_xml_splice_bom_with_empty_element() {
        let mut xml = UTF8_BOM.to_vec();
        xml.extend_from_slice(b"<rss><channel><lastBuildDate/><title>T</title></channel></rss>");
        let out = remove_last_build_date_xml(&xml).unwrap();
        assert_eq!(&out[..3], UTF8_BOM);
        assert_eq!(&out[3..], b"<rss><channel><title>T</title></channel></rss>".as_slice());
    }

    #[test]
    fn test_xml_splice_latin1_bytes_preserved() {
        let xml = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
<rss><channel><title>Caf\xe9</title><lastBuildDate>D</lastBuildDate></channel></rss>";
        let out = remove_last_build_date_xml(xml).unwrap();
        assert_eq!(
            &*out,
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
<rss><channel><title>Caf\xe9</title></channel></rss>"
                .as_slice()
        );
    }

    #[test]
    fn test_xml_splice_handles_empty_element() {
        let xml = "<rss><channel><lastBuildDate/><title>T</title></channel></rss>";
        let out = remove_last_build_date_xml(xml.as_bytes()).unwrap();
        assert_eq!(&*out, b"<rss><channel><title>T</title></channel></rss>".as_slice());
    }

    #[test]
    fn test_xml_splice_ignores_cdata_lookalike() {
        let xml = "<rss><channel><description><![CDATA[<lastBuildDate>x</lastBuildDate>]]></description></channel></rss>";
        let out = remove_last_build_date_xml(xml.as_bytes()).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_xml_splice_without_target_borrows() {
        let xml = b"<feed><updated>2024-01-01T00:00:00Z</updated></feed>";
        let out = remove_last_build_date_xml(xml).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_apply_to_xml_respects_flag() {
        let out = Redaction::default().apply_to_xml(RSS.as_bytes()).unwrap();
        assert_eq!(&*out, RSS.as_bytes());
    }

    proptest! {
        #[test]
        fn prop_tree_redaction_idempotent(
            title in "[a-zA-Z ]{0,20}",
            published in proptest::option::of("[0-9T:.Z-]{1,24}"),
        ) {
            let mut value = json!({"title": title, "entries": []});
            if let Some(p) = published {
                value["published"] = json!(p);
            }
            let mut once = Document::try_from(value).unwrap();
            both().apply(&mut once);
            let mut twice = once.clone();
            both().apply(&mut twice);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_xml_redaction_idempotent(
            date in "[A-Za-z0-9 ,:]{0,30}",
            title in "[0-9 ]{0,20}",
        ) {
            let xml = format!(
                "<rss><channel><title>{title}</title>\n<lastBuildDate>{date}</lastBuildDate></channel></rss>"
            );
            let once = remove_last_build_date_xml(xml.as_bytes()).unwrap().into_owned();
            let twice = remove_last_build_date_xml(&once).unwrap().into_owned();
            prop_assert_eq!(&once, &twice);
            prop_assert!(!String::from_utf8_lossy(&once).contains("lastBuildDate"));
        }
    }
}
