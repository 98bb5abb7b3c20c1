//! Upstream call classification.

use std::time::Duration;

use serde_json::Value;

use crate::MuroError;

/// Classified result of exactly one upstream call.
///
/// Decided once at the client boundary; everything downstream matches on the
/// variant and never inspects upstream messages.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamOutcome {
    /// Non-empty result.
    Success(Value),
    /// The call succeeded but returned zero items. Never overwrites the cache.
    EmptySuccess,
    /// Short-window request throttle (HTTP 429 or equivalent).
    RateLimited { retry_after: Option<Duration> },
    /// Long-horizon budget exhausted (daily units, monthly cap).
    QuotaExceeded { message: String },
    /// Any other non-2xx response, or an unusable 2xx body.
    UpstreamError { status: u16, message: String },
    /// No response was obtained (connect, DNS, timeout).
    TransportError { message: String, timed_out: bool },
}

impl UpstreamOutcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            UpstreamOutcome::Success(_) => "success",
            UpstreamOutcome::EmptySuccess => "empty",
            UpstreamOutcome::RateLimited { .. } => "rate_limited",
            UpstreamOutcome::QuotaExceeded { .. } => "quota_exceeded",
            UpstreamOutcome::UpstreamError { .. } => "upstream_error",
            UpstreamOutcome::TransportError { .. } => "transport_error",
        }
    }

    /// Whether the call failed (anything other than a success or empty page).
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            UpstreamOutcome::Success(_) | UpstreamOutcome::EmptySuccess
        )
    }

    /// The error to surface when no stale entry can cover this failure.
    pub fn to_error(&self) -> Option<MuroError> {
        match self {
            UpstreamOutcome::Success(_) | UpstreamOutcome::EmptySuccess => None,
            UpstreamOutcome::RateLimited { retry_after } => Some(MuroError::RateLimited {
                retry_after: *retry_after,
            }),
            UpstreamOutcome::QuotaExceeded { message } => Some(MuroError::QuotaExceeded {
                message: message.clone(),
            }),
            UpstreamOutcome::UpstreamError { status, message } => Some(MuroError::Upstream {
                status: *status,
                message: message.clone(),
            }),
            UpstreamOutcome::TransportError { message, timed_out } => {
                Some(MuroError::Transport {
                    message: message.clone(),
                    timed_out: *timed_out,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_empty_are_not_failures() {
        assert!(!UpstreamOutcome::Success(Value::Null).is_failure());
        assert!(!UpstreamOutcome::EmptySuccess.is_failure());
        assert!(UpstreamOutcome::RateLimited { retry_after: None }.is_failure());
    }

    #[test]
    fn failures_map_to_matching_error_kind() {
        let cases = [
            (
                UpstreamOutcome::RateLimited { retry_after: None },
                "RateLimited",
            ),
            (
                UpstreamOutcome::QuotaExceeded {
                    message: "daily".into(),
                },
                "QuotaExceeded",
            ),
            (
                UpstreamOutcome::UpstreamError {
                    status: 500,
                    message: "boom".into(),
                },
                "UpstreamError",
            ),
            (
                UpstreamOutcome::TransportError {
                    message: "dns".into(),
                    timed_out: false,
                },
                "TransportError",
            ),
        ];
        for (outcome, kind) in cases {
            assert_eq!(outcome.to_error().unwrap().kind(), kind);
        }
        assert!(UpstreamOutcome::EmptySuccess.to_error().is_none());
    }
}
