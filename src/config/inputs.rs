//! Feed source / destination list decoding.

use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use super::{ConfigError, Mode};
use crate::util::validate_url;

/// Output serialization, chosen by the destination's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON of the normalized document
    Json,
    /// The fetched XML, verbatim apart from redactions
    Xml,
}

/// A validated output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    path: PathBuf,
    format: OutputFormat,
}

impl Destination {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Validates a destination's extension for `mode`.
    ///
    /// A path without an extension gets `.json` appended.
    pub fn parse(raw: &str, mode: Mode) -> Result<Self, ConfigError> {
        let path = Path::new(raw);
        let (path, ext) = match path.extension() {
            None => (PathBuf::from(format!("{raw}.json")), "json".to_owned()),
            Some(ext) => (path.to_path_buf(), ext.to_string_lossy().into_owned()),
        };

        let format = match (ext.as_str(), mode) {
            ("json", _) => OutputFormat::Json,
            ("xml", Mode::Convert) => OutputFormat::Xml,
            _ => return Err(ConfigError::Extension(mode.allowed_extensions())),
        };

        Ok(Self { path, format })
    }
}

/// Decodes a raw input that is either a JSON array, some other JSON value,
/// or a bare string.
///
/// Returns `None` when the list is empty or holds anything other than
/// non-empty strings.
pub(crate) fn decode_string_list(raw: &str) -> Option<Vec<String>> {
    let items = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => vec![other],
        Err(_) => vec![Value::String(raw.to_owned())],
    };

    if items.is_empty() {
        return None;
    }

    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .collect()
}

/// Validates feed sources in order, failing on the first bad one.
pub(crate) fn parse_sources(raw: &[String]) -> Result<Vec<Url>, ConfigError> {
    raw.iter()
        .map(|s| validate_url(s).map_err(|_| ConfigError::InvalidUrl(s.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn list(raw: &str) -> Option<Vec<String>> {
        decode_string_list(raw)
    }

    #[test]
    fn test_bare_string_is_single_element() {
        assert_eq!(
            list("https://example.com/feed"),
            Some(vec!["https://example.com/feed".to_owned()])
        );
    }

    #[test]
    fn test_json_string_is_wrapped() {
        assert_eq!(list(r#""./feed.json""#), Some(vec!["./feed.json".to_owned()]));
    }

    #[test]
    fn test_json_array_is_used() {
        assert_eq!(
            list(r#"["https://a/feed","https://b/feed"]"#),
            Some(vec!["https://a/feed".to_owned(), "https://b/feed".to_owned()])
        );
    }

    #[test]
    fn test_invalid_lists() {
        assert_eq!(list(""), None);
        assert_eq!(list("[]"), None);
        assert_eq!(list(r#"["https://a/feed", ""]"#), None);
        assert_eq!(list(r#"["https://a/feed", 3]"#), None);
        assert_eq!(list("42"), None);
        assert_eq!(list("null"), None);
    }

    #[test]
    fn test_destination_json() {
        let dest = Destination::parse("./out/feed.json", Mode::Extract).unwrap();
        assert_eq!(dest.path(), Path::new("./out/feed.json"));
        assert_eq!(dest.format(), OutputFormat::Json);
    }

    #[test]
    fn test_destination_without_extension_gets_json() {
        let dest = Destination::parse("./out/feed", Mode::Extract).unwrap();
        assert_eq!(dest.path(), Path::new("./out/feed.json"));
        assert_eq!(dest.format(), OutputFormat::Json);
    }

    #[test]
    fn test_destination_xml_only_in_convert_mode() {
        let dest = Destination::parse("feed.xml", Mode::Convert).unwrap();
        assert_eq!(dest.format(), OutputFormat::Xml);

        let err = Destination::parse("feed.xml", Mode::Extract).unwrap_err();
        assert_eq!(err.to_string(), "file extension must be .json");
    }

    #[test]
    fn test_destination_bad_extension() {
        let err = Destination::parse("./feed.txt", Mode::Extract).unwrap_err();
        assert_eq!(err.to_string(), "file extension must be .json");

        let err = Destination::parse("./feed.txt", Mode::Convert).unwrap_err();
        assert_eq!(err.to_string(), "file extension must be .json or .xml");

        // Extension match is exact
        assert!(Destination::parse("feed.JSON", Mode::Extract).is_err());
    }

    #[test]
    fn test_parse_sources_names_first_bad_value() {
        let raw = vec![
            "https://example.com/a".to_owned(),
            "not a url".to_owned(),
            "also bad".to_owned(),
        ];
        let err = parse_sources(&raw).unwrap_err();
        assert_eq!(err.to_string(), "invalid URL: not a url");
    }
}
