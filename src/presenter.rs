//! Outward shape of proxy results: status code, metadata headers, body.
//!
//! Pure formatting; nothing here touches the store or the upstream.

use serde_json::{Value, json};

use crate::proxy::ProxyOutcome;
use crate::types::{CacheState, Resource};
use crate::{MuroError, Result};

pub const X_CACHE: &str = "X-Cache";
pub const X_CACHE_AGE: &str = "X-Cache-Age";
pub const X_CACHE_AGE_MINUTES: &str = "X-Cache-Age-Minutes";
pub const X_CACHE_EXPIRES_IN: &str = "X-Cache-Expires-In";
pub const X_CACHE_WARNING: &str = "X-Cache-Warning";
pub const X_API_ERROR: &str = "X-API-Error";
pub const RETRY_AFTER: &str = "Retry-After";

/// A formatted response, independent of any HTTP framework.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedResponse {
    pub status: u16,
    /// `None` for error responses.
    pub cache_state: Option<CacheState>,
    /// Metadata headers, `X-Cache` first when present.
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl PresentedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Format the result of [`CacheProxy::get`](crate::proxy::CacheProxy::get).
pub fn present(resource: Resource, result: Result<ProxyOutcome>) -> PresentedResponse {
    match result {
        Ok(outcome) => present_outcome(resource, outcome),
        Err(err) => present_error(&err),
    }
}

fn present_outcome(resource: Resource, outcome: ProxyOutcome) -> PresentedResponse {
    let cache_state = outcome.cache_state();
    let mut headers = vec![(X_CACHE, cache_state.as_str().to_string())];

    let body = match outcome {
        ProxyOutcome::Hit {
            payload,
            age,
            expires_in,
        } => {
            headers.push((X_CACHE_AGE, age.as_secs().to_string()));
            headers.push((X_CACHE_EXPIRES_IN, expires_in.as_secs().to_string()));
            payload
        }
        ProxyOutcome::Fetched { payload } => payload,
        ProxyOutcome::NoContent => resource.empty_payload(),
        ProxyOutcome::Stale {
            payload,
            age,
            reason,
        } => {
            headers.push((X_CACHE_AGE, age.as_secs().to_string()));
            if matches!(
                cache_state,
                CacheState::StaleRateLimited | CacheState::StaleQuota
            ) {
                headers.push((X_CACHE_AGE_MINUTES, (age.as_secs() / 60).to_string()));
            }
            headers.push((X_CACHE_WARNING, reason.warning(age)));
            if let Some(detail) = reason.detail() {
                headers.push((X_API_ERROR, detail));
            }
            payload
        }
    };

    PresentedResponse {
        status: 200,
        cache_state: Some(cache_state),
        headers,
        body,
    }
}

/// HTTP status for an error terminal.
pub fn status_for(err: &MuroError) -> u16 {
    match err {
        MuroError::NotConfigured { .. } => 503,
        MuroError::RateLimited { .. } => 429,
        MuroError::QuotaExceeded { .. } => 503,
        MuroError::Upstream { .. } => 502,
        MuroError::Transport {
            timed_out: true, ..
        } => 504,
        MuroError::Transport { .. } => 502,
        MuroError::NoStaleDataAvailable(_) => 404,
        _ => 500,
    }
}

/// `{error, message, hint?}`.
pub fn error_body(err: &MuroError) -> Value {
    let mut body = json!({
        "error": err.kind(),
        "message": err.to_string(),
    });
    if let Some(hint) = err.hint() {
        body["hint"] = Value::String(hint);
    }
    body
}

/// Errors raised after the upstream was called are on the miss path and say so
/// in `X-Cache`; local errors (`NotConfigured`, store) carry no cache state.
pub fn present_error(err: &MuroError) -> PresentedResponse {
    let cache_state = err.is_upstream().then_some(CacheState::Miss);
    let mut headers = Vec::new();
    if let Some(state) = cache_state {
        headers.push((X_CACHE, state.as_str().to_string()));
    }
    if let Some(wait) = err.retry_after() {
        headers.push((RETRY_AFTER, wait.as_secs().to_string()));
    }
    PresentedResponse {
        status: status_for(err),
        cache_state,
        headers,
        body: error_body(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::StaleReason;
    use std::time::Duration;

    #[test]
    fn hit_carries_age_and_expiry() {
        let response = present(
            Resource::Tweets,
            Ok(ProxyOutcome::Hit {
                payload: json!({"data": [1]}),
                age: Duration::from_secs(600),
                expires_in: Duration::from_secs(300),
            }),
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.header("x-cache"), Some("HIT"));
        assert_eq!(response.header(X_CACHE_AGE), Some("600"));
        assert_eq!(response.header(X_CACHE_EXPIRES_IN), Some("300"));
        assert_eq!(response.body, json!({"data": [1]}));
    }

    #[test]
    fn no_content_is_resource_shaped() {
        let response = present(Resource::YoutubeVideos, Ok(ProxyOutcome::NoContent));
        assert_eq!(response.status, 200);
        assert_eq!(response.header(X_CACHE), Some("MISS"));
        assert_eq!(response.body["items"], json!([]));
    }

    #[test]
    fn stale_quota_reports_minutes() {
        let response = present(
            Resource::YoutubeVideos,
            Ok(ProxyOutcome::Stale {
                payload: json!({"items": [1]}),
                age: Duration::from_secs(2000),
                reason: StaleReason::QuotaExceeded {
                    message: "quota".into(),
                },
            }),
        );
        assert_eq!(response.header(X_CACHE), Some("STALE-QUOTA"));
        assert_eq!(response.header(X_CACHE_AGE_MINUTES), Some("33"));
        assert!(response.header(X_CACHE_WARNING).is_some());
        assert!(response.header(X_API_ERROR).is_none());
    }

    #[test]
    fn stale_error_exposes_detail() {
        let response = present(
            Resource::Tweets,
            Ok(ProxyOutcome::Stale {
                payload: json!({"data": [1]}),
                age: Duration::from_secs(60),
                reason: StaleReason::UpstreamFailure {
                    status: Some(500),
                    message: "Internal".into(),
                    timed_out: false,
                },
            }),
        );
        assert_eq!(response.header(X_CACHE), Some("STALE-ERROR"));
        assert_eq!(response.header(X_API_ERROR), Some("HTTP 500: Internal"));
        assert!(response.header(X_CACHE_AGE_MINUTES).is_none());
    }

    #[test]
    fn rate_limited_error_has_retry_after() {
        let response = present(
            Resource::Tweets,
            Err(MuroError::RateLimited {
                retry_after: Some(Duration::from_secs(120)),
            }),
        );
        assert_eq!(response.status, 429);
        assert_eq!(response.header(RETRY_AFTER), Some("120"));
        assert_eq!(response.body["error"], "RateLimited");
        assert!(response.body["hint"].as_str().unwrap().contains("2 minutes"));
        assert_eq!(response.cache_state, Some(CacheState::Miss));
        assert_eq!(response.header(X_CACHE), Some("MISS"));
    }

    #[test]
    fn upstream_errors_are_marked_miss() {
        let errors = [
            MuroError::QuotaExceeded {
                message: "daily".into(),
            },
            MuroError::Upstream {
                status: 500,
                message: "boom".into(),
            },
            MuroError::Transport {
                message: "timed out".into(),
                timed_out: true,
            },
        ];
        for err in errors {
            let response = present(Resource::YoutubeVideos, Err(err));
            assert_eq!(response.header(X_CACHE), Some("MISS"), "{}", response.body);
        }
    }

    #[test]
    fn local_errors_carry_no_cache_state() {
        let response = present(
            Resource::Tweets,
            Err(MuroError::NotConfigured {
                resource: "tweets".into(),
                missing: vec!["X_API_USER_ID"],
            }),
        );
        assert_eq!(response.status, 503);
        assert!(response.cache_state.is_none());
        assert!(response.header(X_CACHE).is_none());
    }

    #[test]
    fn error_status_mapping() {
        let cases = [
            (
                MuroError::NotConfigured {
                    resource: "tweets".into(),
                    missing: vec!["X_API_BEARER_TOKEN"],
                },
                503,
            ),
            (
                MuroError::QuotaExceeded {
                    message: String::new(),
                },
                503,
            ),
            (
                MuroError::Upstream {
                    status: 401,
                    message: String::new(),
                },
                502,
            ),
            (
                MuroError::Transport {
                    message: String::new(),
                    timed_out: true,
                },
                504,
            ),
            (
                MuroError::Transport {
                    message: String::new(),
                    timed_out: false,
                },
                502,
            ),
            (MuroError::NoStaleDataAvailable("tweets".into()), 404),
            (MuroError::Store("disk full".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err), status, "{err}");
        }
    }

    #[test]
    fn error_body_omits_missing_hint() {
        let body = error_body(&MuroError::Upstream {
            status: 500,
            message: "boom".into(),
        });
        assert_eq!(body["error"], "UpstreamError");
        assert!(body.get("hint").is_none());
    }
}
