//! Feed retrieval and normalization.
//!
//! A fetched payload moves through these stages:
//!
//! - [`fetcher`] - HTTP retrieval with caller-supplied fetch options
//! - [`detect`] - classifies the bytes as XML, JSON or neither
//! - [`xml_tree`] - structural XML → key-value tree conversion
//! - [`extractor`] - `feed-rs` interpretation into the fixed feed shape
//! - [`redact`] - removal of volatile fields, in the tree or the raw XML
//!
//! [`selector`] holds the small rule language used to pull extra fields out
//! of raw entries.

mod detect;
mod extractor;
mod fetcher;
mod redact;
mod selector;
pub mod xml_tree;

use thiserror::Error;

pub use detect::{detect, Payload};
pub use extractor::extract;
pub use fetcher::{build_client, fetch_feed, FetchError};
pub use redact::remove_last_build_date_xml;
pub use selector::{FieldSelectors, SelectorError};

/// Errors turning fetched bytes into a document.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unknown feed format; only XML and JSON are supported")]
    Unknown,

    #[error("converting JSON feed to XML output is not supported")]
    JsonToXml,

    #[error("failed to parse feed: {0}")]
    Feed(String),

    #[error("failed to redact XML: {0}")]
    Redact(#[from] xml_tree::XmlTreeError),
}
