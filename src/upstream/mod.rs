//! Upstream API clients.
//!
//! Each client performs exactly one HTTP call per [`UpstreamClient::fetch`]
//! and classifies the result into an [`UpstreamOutcome`]. Clients never retry
//! and never touch the cache; the orchestrator decides what an outcome means.
//!
//! Classification is split from I/O: `classify_*` functions take the status,
//! relevant headers and body, which keeps the decision table unit-testable.

mod x;
mod youtube;

pub use x::{DEFAULT_BASE_URL as X_DEFAULT_BASE_URL, XClient, classify_x_response};
pub use youtube::{
    DEFAULT_BASE_URL as YOUTUBE_DEFAULT_BASE_URL, YouTubeClient, classify_youtube_response,
};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::types::{FetchParams, Resource, UpstreamOutcome};
use crate::{MuroError, Result};

/// Default bound on a single upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A client for one upstream resource.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Client name for logging/debugging.
    fn name(&self) -> &str;

    /// The resource this client fetches.
    fn resource(&self) -> Resource;

    /// Perform one upstream call. Infallible: every failure is an outcome.
    async fn fetch(&self, params: &FetchParams) -> UpstreamOutcome;
}

/// Build the shared HTTP client with a bounded timeout.
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(crate::version::user_agent())
        .build()
        .map_err(|e| MuroError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Map a reqwest error raised before a usable response into an outcome.
pub(crate) fn transport_outcome(err: &reqwest::Error) -> UpstreamOutcome {
    UpstreamOutcome::TransportError {
        message: err.to_string(),
        timed_out: err.is_timeout(),
    }
}

/// Parse a `Retry-After` header given in seconds.
pub(crate) fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
