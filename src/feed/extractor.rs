use chrono::{DateTime, SecondsFormat, Utc};
use feed_rs::model::{Entry, Feed, Link};
use feed_rs::parser;
use serde_json::{Map, Value};
use url::Url;

use crate::config::ParserOptions;
use crate::document::Document;
use crate::feed::{FormatError, Payload};
use crate::util::{strip_control_chars, strip_html, truncate_chars};

/// Where raw entries live in a converted tree, per dialect.
const ENTRY_PATHS: [&[&str]; 4] = [
    &["rss", "channel", "item"],
    &["rdf:RDF", "item"],
    &["feed", "entry"],
    &["items"],
];

/// Interprets a recognized payload as a feed and normalizes it.
///
/// With `normalization` off the converted tree is returned untouched.
/// Otherwise the output has the fixed shape
/// `{title, link, description, language, generator, published, entries}`,
/// with each entry carrying `{id, title, link, published, description}`
/// plus any fields produced by `getExtraEntryFields`.
pub fn extract(
    raw: &[u8],
    payload: &Payload,
    options: &ParserOptions,
) -> Result<Document, FormatError> {
    let tree = payload.document().ok_or(FormatError::Unknown)?;
    if !options.normalization {
        return Ok(tree.clone());
    }

    let feed = parser::parse(raw).map_err(|e| FormatError::Feed(e.to_string()))?;
    let base = options.base_url.as_deref().and_then(|b| match Url::parse(b) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(base_url = %b, error = %e, "Ignoring invalid baseUrl");
            None
        }
    });

    let ctx = Normalizer {
        options,
        base: base.as_ref(),
    };
    let raw_entries = raw_entries(tree);
    if options.extra_entry_fields.is_some() && raw_entries.len() != feed.entries.len() {
        tracing::warn!(
            parsed = feed.entries.len(),
            raw = raw_entries.len(),
            "Entry count mismatch, extra fields may be missing"
        );
    }

    Ok(ctx.feed(&feed, &raw_entries))
}

struct Normalizer<'a> {
    options: &'a ParserOptions,
    base: Option<&'a Url>,
}

impl Normalizer<'_> {
    fn feed(&self, feed: &Feed, raw_entries: &[&Value]) -> Document {
        let mut doc = Document::new();
        doc.insert("title", text(feed.title.as_ref().map(|t| t.content.as_str())));
        doc.insert("link", self.link(&feed.links));
        doc.insert(
            "description",
            text(feed.description.as_ref().map(|t| t.content.as_str())),
        );
        doc.insert("language", text(feed.language.as_deref()));
        doc.insert(
            "generator",
            text(feed.generator.as_ref().map(|g| g.content.as_str())),
        );
        doc.insert("published", self.date(feed.published.or(feed.updated)));

        let entries = feed
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let extra = self
                    .options
                    .extra_entry_fields
                    .as_ref()
                    .zip(raw_entries.get(i))
                    .map(|(rule, raw)| rule.evaluate(raw));
                Value::Object(self.entry(entry, extra))
            })
            .collect();
        doc.insert("entries", Value::Array(entries));
        doc
    }

    fn entry(&self, entry: &Entry, extra: Option<Map<String, Value>>) -> Map<String, Value> {
        let description = entry
            .summary
            .as_ref()
            .map(|s| s.content.as_str())
            .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()))
            .map(|html| {
                let plain = strip_html(html);
                truncate_chars(&plain, self.options.description_max_len).into_owned()
            });

        let mut out = Map::new();
        out.insert("id".into(), Value::String(entry.id.clone()));
        out.insert(
            "title".into(),
            text(entry.title.as_ref().map(|t| t.content.as_str())),
        );
        out.insert("link".into(), self.link(&entry.links));
        out.insert("published".into(), self.date(entry.published.or(entry.updated)));
        out.insert("description".into(), Value::String(description.unwrap_or_default()));

        if let Some(extra) = extra {
            out.extend(extra);
        }
        out
    }

    /// Picks the alternate (or unlabeled) link, falling back to the first.
    fn link(&self, links: &[Link]) -> Value {
        let chosen = links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| links.first());

        let Some(link) = chosen else {
            return Value::String(String::new());
        };
        let href = link.href.trim();
        let resolved = match self.base {
            Some(base) => base
                .join(href)
                .map(String::from)
                .unwrap_or_else(|_| href.to_owned()),
            None => href.to_owned(),
        };
        Value::String(resolved)
    }

    fn date(&self, date: Option<DateTime<Utc>>) -> Value {
        let formatted = date.map(|d| {
            if self.options.use_iso_date_format {
                d.to_rfc3339_opts(SecondsFormat::Millis, true)
            } else {
                d.to_rfc2822()
            }
        });
        Value::String(formatted.unwrap_or_default())
    }
}

fn text(value: Option<&str>) -> Value {
    Value::String(
        value
            .map(|s| strip_control_chars(s.trim()).into_owned())
            .unwrap_or_default(),
    )
}

/// Raw entry nodes from the converted tree, in document order.
///
/// A single entry is stored as a scalar in the tree and comes back as a
/// one-element list.
fn raw_entries(tree: &Document) -> Vec<&Value> {
    ENTRY_PATHS
        .iter()
        .find_map(|path| tree.get_path(path))
        .map(|node| match node {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        })
        .unwrap_or_default()
}
