//! Terminal results of the cache-fallback decision.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheEntry;
use crate::error::{quota_hint, rate_limit_hint};
use crate::types::{CacheState, Resource, UpstreamOutcome};

/// Why a stale entry was served instead of fresh data.
#[derive(Debug, Clone, PartialEq)]
pub enum StaleReason {
    /// Upstream answered with zero items.
    EmptyUpstream,
    RateLimited {
        retry_after: Option<Duration>,
    },
    QuotaExceeded {
        message: String,
    },
    /// Upstream error response (`status` set) or transport failure.
    UpstreamFailure {
        status: Option<u16>,
        message: String,
        timed_out: bool,
    },
}

impl StaleReason {
    /// Reason for a non-success outcome; `None` for `Success`.
    pub fn from_outcome(outcome: UpstreamOutcome) -> Option<Self> {
        match outcome {
            UpstreamOutcome::Success(_) => None,
            UpstreamOutcome::EmptySuccess => Some(StaleReason::EmptyUpstream),
            UpstreamOutcome::RateLimited { retry_after } => {
                Some(StaleReason::RateLimited { retry_after })
            }
            UpstreamOutcome::QuotaExceeded { message } => {
                Some(StaleReason::QuotaExceeded { message })
            }
            UpstreamOutcome::UpstreamError { status, message } => {
                Some(StaleReason::UpstreamFailure {
                    status: Some(status),
                    message,
                    timed_out: false,
                })
            }
            UpstreamOutcome::TransportError { message, timed_out } => {
                Some(StaleReason::UpstreamFailure {
                    status: None,
                    message,
                    timed_out,
                })
            }
        }
    }

    pub fn cache_state(&self) -> CacheState {
        match self {
            StaleReason::EmptyUpstream => CacheState::Stale,
            StaleReason::RateLimited { .. } => CacheState::StaleRateLimited,
            StaleReason::QuotaExceeded { .. } => CacheState::StaleQuota,
            StaleReason::UpstreamFailure { .. } => CacheState::StaleError,
        }
    }

    /// Diagnostic detail of an upstream failure, for `X-API-Error`.
    pub fn detail(&self) -> Option<String> {
        match self {
            StaleReason::UpstreamFailure {
                status: Some(status),
                message,
                ..
            } => Some(format!("HTTP {status}: {message}")),
            StaleReason::UpstreamFailure { message, .. } => Some(message.clone()),
            _ => None,
        }
    }

    /// Human-readable warning attached to the stale response.
    pub fn warning(&self, age: Duration) -> String {
        let minutes = age.as_secs() / 60;
        match self {
            StaleReason::EmptyUpstream => {
                format!("Upstream returned no items. Showing data from {minutes} minutes ago.")
            }
            StaleReason::RateLimited { retry_after } => format!(
                "{} Showing data from {minutes} minutes ago.",
                rate_limit_hint(*retry_after)
            ),
            StaleReason::QuotaExceeded { .. } => {
                format!("{} Showing data from {minutes} minutes ago.", quota_hint())
            }
            StaleReason::UpstreamFailure { .. } => {
                format!("Upstream unavailable. Showing data from {minutes} minutes ago.")
            }
        }
    }
}

/// Successful terminal outcome of one proxied request.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyOutcome {
    /// Fresh entry served; upstream not contacted.
    Hit {
        payload: Value,
        age: Duration,
        expires_in: Duration,
    },
    /// Upstream returned data; the store now holds it.
    Fetched { payload: Value },
    /// Upstream returned nothing and nothing was cached.
    NoContent,
    /// Upstream could not provide data; an expired entry stands in.
    Stale {
        payload: Value,
        age: Duration,
        reason: StaleReason,
    },
}

impl ProxyOutcome {
    pub fn cache_state(&self) -> CacheState {
        match self {
            ProxyOutcome::Hit { .. } => CacheState::Hit,
            ProxyOutcome::Fetched { .. } | ProxyOutcome::NoContent => CacheState::Miss,
            ProxyOutcome::Stale { reason, .. } => reason.cache_state(),
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            ProxyOutcome::Hit { payload, .. }
            | ProxyOutcome::Fetched { payload }
            | ProxyOutcome::Stale { payload, .. } => Some(payload),
            ProxyOutcome::NoContent => None,
        }
    }
}

/// Cache state of one resource, as reported by health checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub has_cache: bool,
    pub is_valid: bool,
    /// Seconds until expiry; `None` when stale or absent.
    pub expires_in: Option<u64>,
    pub last_update: Option<DateTime<Utc>>,
    pub age_seconds: Option<u64>,
}

impl CacheStatus {
    pub fn of(entry: Option<&CacheEntry>, now: DateTime<Utc>) -> Self {
        let entry = entry.filter(|e| e.has_payload());
        Self {
            has_cache: entry.is_some(),
            is_valid: entry.is_some_and(|e| e.is_fresh_at(now)),
            expires_in: entry
                .and_then(|e| e.expires_in_at(now))
                .map(|d| d.as_secs()),
            last_update: entry.map(|e| e.created_at),
            age_seconds: entry.map(|e| e.age_at(now).as_secs()),
        }
    }
}

/// Configuration and cache state of one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub resource: Resource,
    pub configured: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<&'static str>,
    pub cache: CacheStatus,
}
