//! Parser and fetch option blobs.
//!
//! Both arrive as JSON object strings. Decoding happens in two stages so the
//! error can tell a syntax problem (`failed to parse ...`) from a well-formed
//! value of the wrong shape (`invalid ...`).

use std::collections::HashMap;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::ConfigError;
use crate::feed::FieldSelectors;

/// Key holding the extra entry field rule.
pub const EXTRA_ENTRY_FIELDS_KEY: &str = "getExtraEntryFields";

// ============================================================================
// Parser Options
// ============================================================================

/// Options controlling how a fetched feed is normalized in extract mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserOptions {
    /// Emit the fixed feed shape. `false` emits the raw converted tree.
    pub normalization: bool,

    /// ISO-8601 dates (`2024-01-01T00:00:00.000Z`); RFC 2822 otherwise.
    #[serde(rename = "useISODateFormat")]
    pub use_iso_date_format: bool,

    /// Maximum entry description length in characters (0 = unlimited).
    pub description_max_len: usize,

    /// Base for resolving relative links.
    pub base_url: Option<String>,

    /// Compiled `getExtraEntryFields` rule.
    #[serde(skip)]
    pub extra_entry_fields: Option<FieldSelectors>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            normalization: true,
            use_iso_date_format: true,
            description_max_len: 250,
            base_url: None,
            extra_entry_fields: None,
        }
    }
}

impl ParserOptions {
    const KNOWN_KEYS: [&'static str; 5] = [
        "normalization",
        "useISODateFormat",
        "descriptionMaxLen",
        "baseUrl",
        EXTRA_ENTRY_FIELDS_KEY,
    ];

    /// Decodes the `parserOptions` input.
    ///
    /// - Missing or blank → defaults
    /// - Malformed JSON → [`ConfigError::OptionsSyntax`]
    /// - Not an object, or a known key with the wrong type → [`ConfigError::OptionsShape`]
    /// - `getExtraEntryFields` string that fails to compile → [`ConfigError::ExtraFields`]
    pub fn decode(raw: Option<&str>) -> Result<Self, ConfigError> {
        let Some(mut obj) = decode_object(raw, "parser")? else {
            return Ok(Self::default());
        };
        log_unknown_keys(&obj, &Self::KNOWN_KEYS, "parserOptions");

        let extra_entry_fields = match obj.remove(EXTRA_ENTRY_FIELDS_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(rule)) if rule.trim().is_empty() => None,
            Some(Value::String(rule)) => Some(FieldSelectors::compile(&rule)?),
            Some(_) => {
                return Err(ConfigError::OptionsShape {
                    which: "parser",
                    message: format!("{EXTRA_ENTRY_FIELDS_KEY} must be a string"),
                })
            }
        };

        let mut options: Self =
            serde_json::from_value(Value::Object(obj)).map_err(|e| ConfigError::OptionsShape {
                which: "parser",
                message: e.to_string(),
            })?;
        options.extra_entry_fields = extra_entry_fields;
        Ok(options)
    }
}

// ============================================================================
// Fetch Options
// ============================================================================

/// Options applied to the HTTP request for each feed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchOptions {
    /// HTTP method, GET when absent.
    pub method: Option<String>,

    /// Extra request headers.
    pub headers: HashMap<String, String>,

    /// Overrides the client's User-Agent.
    pub user_agent: Option<String>,

    /// Whole-request timeout in milliseconds. No timeout when absent.
    pub timeout: Option<u64>,

    /// Request body.
    pub body: Option<String>,
}

impl FetchOptions {
    const KNOWN_KEYS: [&'static str; 5] = ["method", "headers", "userAgent", "timeout", "body"];

    /// Decodes the `fetchOptions` input.
    ///
    /// The method and header names/values are checked here so that a bad
    /// option fails before any request goes out.
    pub fn decode(raw: Option<&str>) -> Result<Self, ConfigError> {
        let Some(obj) = decode_object(raw, "fetch")? else {
            return Ok(Self::default());
        };
        log_unknown_keys(&obj, &Self::KNOWN_KEYS, "fetchOptions");

        let options: Self =
            serde_json::from_value(Value::Object(obj)).map_err(|e| ConfigError::OptionsShape {
                which: "fetch",
                message: e.to_string(),
            })?;
        options.check().map_err(|message| ConfigError::OptionsShape {
            which: "fetch",
            message,
        })?;
        Ok(options)
    }

    fn check(&self) -> Result<(), String> {
        if let Some(method) = &self.method {
            Method::from_bytes(method.as_bytes())
                .map_err(|_| format!("invalid HTTP method: {method}"))?;
        }
        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name: {name}"))?;
            HeaderValue::from_str(value)
                .map_err(|_| format!("invalid value for header {name}"))?;
        }
        if let Some(agent) = &self.user_agent {
            HeaderValue::from_str(agent).map_err(|_| "invalid userAgent".to_owned())?;
        }
        Ok(())
    }

    /// HTTP method to use, GET when unset.
    pub fn method(&self) -> Method {
        self.method
            .as_deref()
            .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
            .unwrap_or(Method::GET)
    }
}

// ============================================================================
// Shared decoding
// ============================================================================

/// Stage one: JSON syntax and object shape. `None` means "use defaults".
fn decode_object(
    raw: Option<&str>,
    which: &'static str,
) -> Result<Option<Map<String, Value>>, ConfigError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    let value: Value =
        serde_json::from_str(raw).map_err(|source| ConfigError::OptionsSyntax { which, source })?;

    match value {
        Value::Object(obj) => Ok(Some(obj)),
        Value::Null => Ok(None),
        _ => Err(ConfigError::OptionsShape {
            which,
            message: "expected a JSON object".to_owned(),
        }),
    }
}

fn log_unknown_keys(obj: &Map<String, Value>, known: &[&str], input: &str) {
    for key in obj.keys() {
        if !known.contains(&key.as_str()) {
            tracing::debug!(key = %key, input = input, "Unknown option, ignoring");
        }
    }
}
