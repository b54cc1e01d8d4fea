use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::FetchOptions;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 5;
const DEFAULT_USER_AGENT: &str = concat!("feedsnap/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while retrieving a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connection, TLS, timeout or redirect failure
    #[error("network error or invalid URL")]
    Network(#[source] reqwest::Error),
    /// HTTP response with non-2xx status code.
    ///
    /// `reason` is the standard phrase for `status` ("Unknown" for codes with
    /// none). reqwest does not expose the phrase the server sent.
    #[error("HTTP {status} {reason}")]
    HttpStatus { status: u16, reason: String },
    /// Response body exceeded the 10MB size limit
    #[error("response too large (limit {limit} bytes)")]
    ResponseTooLarge { limit: usize },
}

impl FetchError {
    fn from_status(status: StatusCode) -> Self {
        Self::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_owned(),
        }
    }
}

// ============================================================================
// HTTP Client Configuration
// ============================================================================

/// Redirect policy with loop detection and limited hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Builds the HTTP client shared by every fetch in a run.
///
/// No default timeout is set; `fetchOptions.timeout` applies per request.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .user_agent(DEFAULT_USER_AGENT)
        .build()
}

// ============================================================================
// Fetching
// ============================================================================

/// Fetches one feed and returns the raw response body.
///
/// A single attempt is made. Transport failures collapse into
/// [`FetchError::Network`]; any non-2xx status is [`FetchError::HttpStatus`].
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &Url,
    options: &FetchOptions,
) -> Result<Vec<u8>, FetchError> {
    let mut request = client.request(options.method(), url.clone());

    for (name, value) in &options.headers {
        // Already validated at config time
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            request = request.header(name, value);
        }
    }
    if let Some(agent) = &options.user_agent {
        request = request.header(USER_AGENT, agent.as_str());
    }
    if let Some(ms) = options.timeout {
        request = request.timeout(Duration::from_millis(ms));
    }
    if let Some(body) = &options.body {
        request = request.body(body.clone());
    }

    tracing::debug!(url = %url, method = %options.method(), "Fetching feed");

    let response = request.send().await.map_err(|e| {
        tracing::debug!(url = %url, error = %e, "Request failed");
        FetchError::Network(e)
    })?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(url = %url, status = %status, "Feed request was not successful");
        return Err(FetchError::from_status(status));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    tracing::debug!(url = %url, bytes = bytes.len(), "Fetched feed");
    Ok(bytes)
}

async fn read_limited_bytes(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge { limit });
        }
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(FetchError::Network)? {
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge { limit });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
