//! Per-feed orchestration: fetch, parse, redact, write.
//!
//! Pairs are processed strictly one after another in input order. The first
//! failing stage aborts the run; files already written stay in place.

use std::borrow::Cow;
use std::io::Write;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::config::{Config, ConfigError, FeedJob, Mode, OutputFormat};
use crate::document::Document;
use crate::feed::{detect, extract, fetch_feed, FetchError, FormatError, Payload};
use crate::output::{write_snapshot, WriteError};

/// Any failure that ends a run. Displays as the underlying message.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A document that was written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: PathBuf,
    pub document: Document,
}

/// Runs every job in `config`, reporting each saved file on `log`.
pub async fn run(
    config: &Config,
    client: &reqwest::Client,
    log: &mut impl Write,
) -> Result<Vec<Snapshot>, RunError> {
    let mut snapshots = Vec::with_capacity(config.jobs.len());

    for (index, job) in config.jobs.iter().enumerate() {
        tracing::info!(
            index = index,
            url = %job.source,
            path = %job.destination.path().display(),
            "Processing feed"
        );

        let snapshot = process(config, client, job).await.inspect_err(|e| {
            tracing::error!(index = index, url = %job.source, error = %e, "Feed failed");
        })?;

        if let Err(e) = writeln!(log, "feed saved to {} successfully", snapshot.path.display()) {
            tracing::warn!(
                path = %snapshot.path.display(),
                error = %e,
                "Failed to report saved feed"
            );
        }
        snapshots.push(snapshot);
    }

    Ok(snapshots)
}

async fn process(
    config: &Config,
    client: &reqwest::Client,
    job: &FeedJob,
) -> Result<Snapshot, RunError> {
    let body = fetch_feed(client, &job.source, &config.fetch_options).await?;

    let payload = detect(&body);
    tracing::debug!(url = %job.source, format = payload.format_name(), "Detected payload");

    let raw: Cow<'_, [u8]> = match &payload {
        Payload::Xml(_) => config
            .redaction
            .apply_to_xml(&body)
            .map_err(FormatError::from)?,
        Payload::Json(_) => Cow::Borrowed(body.as_slice()),
        Payload::Unrecognized => return Err(FormatError::Unknown.into()),
    };

    let format = job.destination.format();
    if format == OutputFormat::Xml && matches!(payload, Payload::Json(_)) {
        return Err(FormatError::JsonToXml.into());
    }

    let mut document = match config.mode {
        Mode::Extract => extract(&raw, &payload, &config.parser_options)?,
        Mode::Convert => payload.document().cloned().ok_or(FormatError::Unknown)?,
    };
    config.redaction.apply(&mut document);

    let contents = match format {
        OutputFormat::Json => Cow::Owned(document.to_pretty_json()?.into_bytes()),
        OutputFormat::Xml => raw,
    };

    let path = job.destination.path();
    write_snapshot(path, &contents)?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "Feed saved");

    Ok(Snapshot {
        path: path.to_path_buf(),
        document,
    })
}

/// The `feed` step output: the document itself for a single feed, a JSON
/// array of documents for several.
pub fn feed_output(snapshots: &[Snapshot]) -> serde_json::Result<String> {
    match snapshots {
        [single] => single.document.to_pretty_json(),
        many => {
            let docs: Vec<Value> = many.iter().map(|s| s.document.clone().into_value()).collect();
            serde_json::to_string_pretty(&docs)
        }
    }
}
