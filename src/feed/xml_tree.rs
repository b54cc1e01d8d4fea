//! Structural XML → tree conversion.
//!
//! Produces the same shape xml2js emits with `explicitArray: false`:
//!
//! - the root element becomes the single top-level key
//! - attributes live under `$`, text under `_` when mixed with attributes or
//!   child elements
//! - an element holding only text becomes that string; an empty element `""`
//! - repeated sibling elements become an array, a single occurrence stays a
//!   scalar (arrays-of-one are collapsed, and stay collapsed)
//!
//! Namespace prefixes are kept verbatim in keys (`content:encoded`,
//! `atom:link`). Comments, processing instructions and the DOCTYPE are
//! dropped.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::document::Document;

/// Maximum element nesting depth accepted before giving up.
/// Keeps hostile payloads from building trees too deep to serialize.
const MAX_XML_DEPTH: usize = 256;

/// Attribute map key
pub const ATTR_KEY: &str = "$";
/// Character data key
pub const CHAR_KEY: &str = "_";

pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum XmlTreeError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attr(#[from] AttrError),

    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("text outside of the root element")]
    TextOutsideRoot,

    #[error("more than one root element")]
    MultipleRoots,

    #[error("closing tag without matching opening tag")]
    UnbalancedEnd,

    #[error("unexpected end of document inside <{0}>")]
    UnclosedElement(String),

    #[error("document has no root element")]
    NoRoot,
}

/// An element under construction.
struct Frame {
    name: String,
    text: String,
    attrs: Map<String, Value>,
    children: Map<String, Value>,
}

impl Frame {
    fn open(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Self, XmlTreeError> {
        let decoder = reader.decoder();
        let mut attrs = Map::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.decode_and_unescape_value(decoder)?;
            attrs.insert(key, Value::String(value.into_owned()));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            text: String::new(),
            attrs,
            children: Map::new(),
        })
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            None => {
                self.children.insert(name, value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }

    fn close(self) -> (String, Value) {
        let has_text = !self.text.trim().is_empty();

        if self.attrs.is_empty() && self.children.is_empty() {
            // Text-only and whitespace-only elements both collapse to their text
            return (self.name, Value::String(self.text));
        }

        let mut obj = Map::new();
        if has_text {
            obj.insert(CHAR_KEY.to_owned(), Value::String(self.text));
        }
        if !self.attrs.is_empty() {
            obj.insert(ATTR_KEY.to_owned(), Value::Object(self.attrs));
        }
        obj.extend(self.children);
        (self.name, Value::Object(obj))
    }
}

/// Parses an XML payload into a [`Document`] keyed by its root element name.
///
/// # Errors
///
/// Fails on anything that is not a single well-formed element tree:
/// syntax errors, mismatched or unclosed tags, stray top-level text,
/// multiple roots, unknown entities, or nesting deeper than 256 levels.
pub fn parse_xml_tree(bytes: &[u8]) -> Result<Document, XmlTreeError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    // SEC-002: quick-xml resolves only the five predefined entities; DOCTYPE
    // entity declarations are never expanded. Text is decoded with the
    // encoding named in the XML declaration.
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if root.is_some() && stack.is_empty() {
                    return Err(XmlTreeError::MultipleRoots);
                }
                if stack.len() >= MAX_XML_DEPTH {
                    return Err(XmlTreeError::MaxDepthExceeded(MAX_XML_DEPTH));
                }
                stack.push(Frame::open(&e, &reader)?);
            }
            Event::Empty(e) => {
                let frame = Frame::open(&e, &reader)?;
                attach(&mut stack, &mut root, frame.close())?;
            }
            Event::End(_) => {
                let frame = stack.pop().ok_or(XmlTreeError::UnbalancedEnd)?;
                attach(&mut stack, &mut root, frame.close())?;
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(e) => {
                let text = reader.decoder().decode(&e).map_err(quick_xml::Error::from)?;
                push_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions, DOCTYPE
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.pop() {
        return Err(XmlTreeError::UnclosedElement(open.name));
    }

    let (name, value) = root.ok_or(XmlTreeError::NoRoot)?;
    let mut doc = Document::new();
    doc.insert(name, value);
    Ok(doc)
}

fn push_text(stack: &mut [Frame], text: &str) -> Result<(), XmlTreeError> {
    match stack.last_mut() {
        Some(frame) => {
            frame.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlTreeError::TextOutsideRoot),
    }
}

fn attach(
    stack: &mut [Frame],
    root: &mut Option<(String, Value)>,
    (name, value): (String, Value),
) -> Result<(), XmlTreeError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.add_child(name, value);
            Ok(())
        }
        None if root.is_some() => Err(XmlTreeError::MultipleRoots),
        None => {
            *root = Some((name, value));
            Ok(())
        }
    }
}
