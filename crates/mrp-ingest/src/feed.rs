//! HTTP access to the upstream rover feeds
//!
//! Thin reqwest wrapper that distinguishes a structural "not found" from a
//! transport failure. For at least one source family a 404 on page 0 is the
//! only reliable empty-sol signal, so the two must never be conflated.
//! Every request carries a timeout; a timed-out page is a failure, never
//! left pending.

use serde_json::Value;
use std::time::Duration;

/// Error type for feed fetches
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Result of fetching one feed page
#[derive(Debug)]
pub enum FetchOutcome {
    /// The endpoint reported 404 for this page
    NotFound,
    /// A JSON payload
    Json(Value),
}

/// HTTP client for the rover feeds
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
}

impl FeedClient {
    /// Build a client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mrp-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Fetch one page of a feed
    ///
    /// Returns `FetchOutcome::NotFound` for a 404, the parsed JSON body for
    /// a 2xx, and an error for everything else (including timeouts).
    pub async fn fetch_page(&self, url: &str) -> Result<FetchOutcome, FeedError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }

        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| FeedError::Body {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(FetchOutcome::Json(body))
    }
}
