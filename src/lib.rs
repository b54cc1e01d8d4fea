//! Feed snapshots for CI pipelines.
//!
//! One run fetches each configured feed, turns it into a [`document::Document`],
//! strips volatile fields and writes the result next to the repository's other
//! build artifacts. See [`pipeline::run`] for the per-feed flow.

pub mod config;
pub mod document;
pub mod feed;
pub mod host;
pub mod output;
pub mod pipeline;
pub mod util;
