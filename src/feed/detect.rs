use serde_json::Value;

use crate::document::Document;
use crate::feed::xml_tree::parse_xml_tree;

/// Result of format detection on a fetched payload.
///
/// Produced by two independent parse attempts, XML first, then JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// XML-family feed (RSS, Atom, RDF, podcast dialects) as a converted tree
    Xml(Document),
    /// JSON payload whose root is an object
    Json(Document),
    /// Neither well-formed XML nor a JSON object
    Unrecognized,
}

impl Payload {
    pub fn document(&self) -> Option<&Document> {
        match self {
            Payload::Xml(doc) | Payload::Json(doc) => Some(doc),
            Payload::Unrecognized => None,
        }
    }

    pub fn format_name(&self) -> &'static str {
        match self {
            Payload::Xml(_) => "xml",
            Payload::Json(_) => "json",
            Payload::Unrecognized => "unknown",
        }
    }
}

/// Classifies raw response bytes.
pub fn detect(bytes: &[u8]) -> Payload {
    let xml_err = match parse_xml_tree(bytes) {
        Ok(doc) => return Payload::Xml(doc),
        Err(e) => e,
    };

    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => match Document::try_from(value) {
            Ok(doc) => Payload::Json(doc),
            Err(e) => {
                tracing::debug!(error = %e, "JSON payload is not an object");
                Payload::Unrecognized
            }
        },
        Err(json_err) => {
            tracing::debug!(
                xml_error = %xml_err,
                json_error = %json_err,
                "Payload is neither XML nor JSON"
            );
            Payload::Unrecognized
        }
    }
}
