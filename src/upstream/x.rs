//! X (Twitter) API v2 client for a user's recent posts.
//!
//! See: <https://docs.x.com/x-api/users/get-posts>

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{UpstreamClient, build_http_client, retry_after_header, transport_outcome};
use crate::Result;
use crate::types::{FetchParams, Resource, UpstreamOutcome};

/// Default base URL for the X API
pub const DEFAULT_BASE_URL: &str = "https://api.x.com";

const TWEET_FIELDS: &str = "id,text,created_at,public_metrics,author_id";
const USER_FIELDS: &str = "id,name,username,profile_image_url";
const EXPANSIONS: &str = "author_id";

/// Problem title the X API uses for an exhausted monthly usage cap.
const USAGE_CAP_TITLE: &str = "UsageCapExceeded";

/// Client for the X user-timeline endpoint (bearer-token auth).
#[derive(Clone)]
pub struct XClient {
    bearer_token: String,
    user_id: String,
    http: Client,
    base_url: String,
}

impl XClient {
    /// Create a client for `user_id` with the default timeout.
    pub fn new(bearer_token: impl Into<String>, user_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(bearer_token, user_id, DEFAULT_BASE_URL, super::DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(
        bearer_token: impl Into<String>,
        user_id: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            bearer_token: bearer_token.into(),
            user_id: user_id.into(),
            http: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/2/users/{}/tweets", self.base_url, self.user_id)
    }
}

/// Seconds until the window in `x-rate-limit-reset` (epoch seconds) reopens.
fn rate_limit_reset(headers: &HeaderMap) -> Option<Duration> {
    let reset = headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())?;
    let wait = reset.saturating_sub(Utc::now().timestamp());
    Some(Duration::from_secs(u64::try_from(wait).unwrap_or(0)))
}

fn log_rate_limit_headers(headers: &HeaderMap) {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("n/a")
            .to_string()
    };
    debug!(
        limit = %get("x-rate-limit-limit"),
        remaining = %get("x-rate-limit-remaining"),
        reset = %get("x-rate-limit-reset"),
        "x rate limit status"
    );
}

/// Pull a human message out of an X problem document.
fn problem_message(body: &Value) -> Option<String> {
    body.get("detail")
        .or_else(|| body.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Classify an X API response.
///
/// - 200 with a non-empty `data` array → `Success`
/// - 200 with no posts → `EmptySuccess`, unless it carries `errors` only
/// - 429 with a usage-cap problem → `QuotaExceeded`, otherwise `RateLimited`
/// - anything else → `UpstreamError` with `detail`/`title` as message
pub fn classify_x_response(
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
            let has_posts = value
                .get("data")
                .and_then(Value::as_array)
                .is_some_and(|posts| !posts.is_empty());
            if has_posts {
                return UpstreamOutcome::Success(value);
            }
            // Lookup failures (unknown user, suspended account) come back as 200 + errors.
            if let Some(first) = value
                .get("errors")
                .and_then(Value::as_array)
                .and_then(|errors| errors.first())
            {
                return UpstreamOutcome::UpstreamError {
                    status,
                    message: problem_message(first)
                        .unwrap_or_else(|| "upstream reported errors".to_string()),
                };
            }
            UpstreamOutcome::EmptySuccess
        }
        429 => {
            let usage_capped = parsed.as_ref().is_some_and(|v| {
                v.get("title").and_then(Value::as_str) == Some(USAGE_CAP_TITLE)
                    || v.get("type")
                        .and_then(Value::as_str)
                        .is_some_and(|t| t.ends_with("usage-capped"))
            });
            if usage_capped {
                UpstreamOutcome::QuotaExceeded {
                    message: parsed
                        .as_ref()
                        .and_then(problem_message)
                        .unwrap_or_else(|| "X API usage cap exceeded".to_string()),
                }
            } else {
                UpstreamOutcome::RateLimited { retry_after }
            }
        }
        code => UpstreamOutcome::UpstreamError {
            status: code,
            message: parsed
                .as_ref()
                .and_then(problem_message)
                .unwrap_or_else(|| format!("HTTP Error {code}")),
        },
    }
}

#[async_trait]
impl UpstreamClient for XClient {
    fn name(&self) -> &str {
        "x"
    }

    fn resource(&self) -> Resource {
        Resource::Tweets
    }

    async fn fetch(&self, params: &FetchParams) -> UpstreamOutcome {
        info!(user_id = %self.user_id, max_results = params.max_results, "requesting posts from X API");

        let response = match self
            .http
            .get(self.url())
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("max_results", params.max_results.to_string().as_str()),
                ("tweet.fields", TWEET_FIELDS),
                ("user.fields", USER_FIELDS),
                ("expansions", EXPANSIONS),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "X API request failed");
                return transport_outcome(&e);
            }
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        log_rate_limit_headers(&headers);
        let retry_after = rate_limit_reset(&headers).or_else(|| retry_after_header(&headers));

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return transport_outcome(&e),
        };

        let outcome = classify_x_response(status, retry_after, &body);
        if outcome.is_failure() {
            warn!(status, outcome = outcome.label(), "X API returned an error");
        }
        outcome
    }
}
