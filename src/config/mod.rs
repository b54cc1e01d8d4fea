//! Run configuration.
//!
//! The host hands us loosely typed strings (`INPUT_*` variables or CLI flags).
//! [`Config::resolve`] turns them into a fully validated, immutable [`Config`]
//! before any network traffic happens; every failure here is a
//! [`ConfigError`] and aborts the run with zero side effects.
mod inputs;
mod options;

pub use inputs::{Destination, OutputFormat};
pub use options::{FetchOptions, ParserOptions, EXTRA_ENTRY_FIELDS_KEY};

use thiserror::Error;
use url::Url;

use crate::feed::SelectorError;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("feed URL is not an array of non-empty strings")]
    FeedUrlNotStrings,

    #[error("filePath is not an array of non-empty strings")]
    FilePathNotStrings,

    #[error("arrays do not have the same length")]
    LengthMismatch,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("file extension must be {0}")]
    Extension(&'static str),

    #[error("failed to parse {which}Options input: {source}")]
    OptionsSyntax {
        which: &'static str,
        source: serde_json::Error,
    },

    #[error("invalid {which}Options input: {message}")]
    OptionsShape { which: &'static str, message: String },

    #[error("failed to evaluate getExtraEntryFields function: {0}")]
    ExtraFields(#[from] SelectorError),

    #[error("{0} must be either \"true\" or \"false\"")]
    Flag(&'static str),

    #[error("mode must be either \"extract\" or \"convert\"")]
    Mode,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// How a fetched payload becomes a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Interpret the feed and emit the fixed feed shape.
    #[default]
    Extract,
    /// Convert the payload structurally (XML → tree, JSON as-is).
    Convert,
}

impl Mode {
    fn parse(raw: Option<&str>) -> Result<Self, ConfigError> {
        match raw.map(str::trim) {
            None | Some("") | Some("extract") => Ok(Mode::Extract),
            Some("convert") => Ok(Mode::Convert),
            Some(_) => Err(ConfigError::Mode),
        }
    }

    pub(crate) fn allowed_extensions(self) -> &'static str {
        match self {
            Mode::Extract => ".json",
            Mode::Convert => ".json or .xml",
        }
    }
}

/// Raw, unvalidated input strings as received from the host.
///
/// `None` and empty strings both mean "not provided".
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub feed_url: Option<String>,
    pub file_path: Option<String>,
    pub parser_options: Option<String>,
    pub fetch_options: Option<String>,
    pub remove_published: Option<String>,
    pub remove_last_build_date: Option<String>,
    pub mode: Option<String>,
}

/// One feed source paired with its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedJob {
    pub source: Url,
    pub destination: Destination,
}

/// Fields stripped from each document before it is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Redaction {
    pub remove_published: bool,
    pub remove_last_build_date: bool,
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    /// Feed/destination pairs, in input order
    pub jobs: Vec<FeedJob>,
    pub parser_options: ParserOptions,
    pub fetch_options: FetchOptions,
    pub redaction: Redaction,
}

impl Config {
    /// Validates raw inputs.
    ///
    /// Checks run in a fixed order so the first reported error is stable:
    /// feed list, destination list, lengths, URLs, extensions, options,
    /// flags.
    pub fn resolve(raw: &RawInputs) -> Result<Self, ConfigError> {
        let mode = Mode::parse(raw.mode.as_deref())?;

        let sources = inputs::decode_string_list(raw.feed_url.as_deref().unwrap_or_default())
            .ok_or(ConfigError::FeedUrlNotStrings)?;
        let destinations =
            inputs::decode_string_list(raw.file_path.as_deref().unwrap_or_default())
                .ok_or(ConfigError::FilePathNotStrings)?;

        if sources.len() != destinations.len() {
            return Err(ConfigError::LengthMismatch);
        }

        let sources = inputs::parse_sources(&sources)?;
        let destinations = destinations
            .iter()
            .map(|d| Destination::parse(d, mode))
            .collect::<Result<Vec<_>, _>>()?;

        let parser_options = ParserOptions::decode(raw.parser_options.as_deref())?;
        let fetch_options = FetchOptions::decode(raw.fetch_options.as_deref())?;

        let redaction = Redaction {
            remove_published: parse_flag(raw.remove_published.as_deref(), "removePublished")?,
            remove_last_build_date: parse_flag(
                raw.remove_last_build_date.as_deref(),
                "removeLastBuildDate",
            )?,
        };

        let jobs: Vec<FeedJob> = sources
            .into_iter()
            .zip(destinations)
            .map(|(source, destination)| FeedJob {
                source,
                destination,
            })
            .collect();

        tracing::debug!(
            mode = ?mode,
            feeds = jobs.len(),
            remove_published = redaction.remove_published,
            remove_last_build_date = redaction.remove_last_build_date,
            "Resolved configuration"
        );

        Ok(Self {
            mode,
            jobs,
            parser_options,
            fetch_options,
            redaction,
        })
    }
}

/// Tri-state boolean input: unset/empty/`"false"` → false, `"true"` → true.
fn parse_flag(raw: Option<&str>, name: &'static str) -> Result<bool, ConfigError> {
    match raw {
        None | Some("") | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(_) => Err(ConfigError::Flag(name)),
    }
}

// ============================================================================
// Tests
// ============================================================================
