//! YouTube Data API v3 client for a channel's latest uploads.
//!
//! See: <https://developers.google.com/youtube/v3/docs/search/list>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use super::{UpstreamClient, build_http_client, retry_after_header, transport_outcome};
use crate::Result;
use crate::types::{FetchParams, Resource, UpstreamOutcome};

/// Default base URL for the YouTube Data API
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// Client for the YouTube search endpoint (API-key auth).
#[derive(Clone)]
pub struct YouTubeClient {
    api_key: String,
    channel_id: String,
    http: Client,
    base_url: String,
}

impl YouTubeClient {
    /// Create a client for `channel_id` with the default timeout.
    pub fn new(api_key: impl Into<String>, channel_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, channel_id, DEFAULT_BASE_URL, super::DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(
        api_key: impl Into<String>,
        channel_id: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            channel_id: channel_id.into(),
            http: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

/// First `error.errors[].reason` of a Google API error document.
fn error_reason(body: &Value) -> Option<&str> {
    body.pointer("/error/errors/0/reason").and_then(Value::as_str)
}

fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Classify a YouTube Data API response.
///
/// - 2xx with a non-empty `items` array → `Success`, empty → `EmptySuccess`
/// - 403 `quotaExceeded` / `dailyLimitExceeded` → `QuotaExceeded`
/// - 403 `rateLimitExceeded` / `userRateLimitExceeded`, or 429 → `RateLimited`
/// - other 403 → `UpstreamError` "Forbidden: <reason>"
/// - anything else → `UpstreamError` with `error.message`
pub fn classify_youtube_response(
    status: u16,
    retry_after: Option<Duration>,
    body: &str,
) -> UpstreamOutcome {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    match status {
        200..=299 => {
            let Some(value) = parsed else {
                return UpstreamOutcome::UpstreamError {
                    status,
                    message: "invalid JSON in upstream response".to_string(),
                };
            };
            let has_items = value
                .get("items")
                .and_then(Value::as_array)
                .is_some_and(|items| !items.is_empty());
            if has_items {
                UpstreamOutcome::Success(value)
            } else {
                UpstreamOutcome::EmptySuccess
            }
        }
        403 => {
            let reason = parsed.as_ref().and_then(error_reason).unwrap_or("unknown");
            match reason {
                "quotaExceeded" | "dailyLimitExceeded" => UpstreamOutcome::QuotaExceeded {
                    message: parsed
                        .as_ref()
                        .and_then(error_message)
                        .unwrap_or_else(|| "YouTube API daily quota exceeded".to_string()),
                },
                "rateLimitExceeded" | "userRateLimitExceeded" => {
                    UpstreamOutcome::RateLimited { retry_after }
                }
                other => UpstreamOutcome::UpstreamError {
                    status,
                    message: format!("Forbidden: {other}"),
                },
            }
        }
        429 => UpstreamOutcome::RateLimited { retry_after },
        code => UpstreamOutcome::UpstreamError {
            status: code,
            message: parsed
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| format!("HTTP Error {code}")),
        },
    }
}

#[async_trait]
impl UpstreamClient for YouTubeClient {
    fn name(&self) -> &str {
        "youtube"
    }

    fn resource(&self) -> Resource {
        Resource::YoutubeVideos
    }

    async fn fetch(&self, params: &FetchParams) -> UpstreamOutcome {
        // The API key travels in the query string; never log the URL.
        info!(channel_id = %self.channel_id, max_results = params.max_results, "requesting videos from YouTube API");

        let response = match self
            .http
            .get(format!("{}/youtube/v3/search", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("key", self.api_key.as_str()),
                ("channelId", self.channel_id.as_str()),
                ("part", "snippet,id"),
                ("order", "date"),
                ("maxResults", params.max_results.to_string().as_str()),
                ("type", "video"),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let e = e.without_url();
                warn!(error = %e, "YouTube API request failed");
                return transport_outcome(&e);
            }
        };

        let status = response.status().as_u16();
        let retry_after = retry_after_header(response.headers());
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return transport_outcome(&e.without_url()),
        };

        let outcome = classify_youtube_response(status, retry_after, &body);
        if outcome.is_failure() {
            warn!(status, outcome = outcome.label(), "YouTube API returned an error");
        }
        outcome
    }
}
