//! Muro error types

use std::time::Duration;

/// Fallback wait suggested when the upstream gives no reset time.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(15 * 60);

/// Muro error types.
///
/// Upstream failures only reach the caller when no stale entry can stand in
/// for them; otherwise the orchestrator folds them into a stale response.
#[derive(Debug, thiserror::Error)]
pub enum MuroError {
    // Configuration errors
    #[error("{resource} is not configured (missing: {})", missing.join(", "))]
    NotConfigured {
        resource: String,
        missing: Vec<&'static str>,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    // Upstream errors
    #[error("upstream rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("upstream quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("transport error: {message}")]
    Transport { message: String, timed_out: bool },

    // Cache errors
    #[error("no cached data available for {0}")]
    NoStaleDataAvailable(String),

    /// Recovered inside the store; a corrupt entry reads as absent.
    #[error("corrupt cache entry: {0}")]
    StoreCorrupt(String),

    #[error("cache store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MuroError {
    /// Machine-readable kind, used as the `error` field of response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            MuroError::NotConfigured { .. } => "NotConfigured",
            MuroError::Configuration(_) => "ConfigurationError",
            MuroError::RateLimited { .. } => "RateLimited",
            MuroError::QuotaExceeded { .. } => "QuotaExceeded",
            MuroError::Upstream { .. } => "UpstreamError",
            MuroError::Transport { .. } => "TransportError",
            MuroError::NoStaleDataAvailable(_) => "NoStaleDataAvailable",
            MuroError::StoreCorrupt(_) => "StoreCorrupt",
            MuroError::Store(_) => "StoreError",
            MuroError::Json(_) => "InternalError",
        }
    }

    /// Remediation guidance for the caller, if there is any to give.
    pub fn hint(&self) -> Option<String> {
        match self {
            MuroError::NotConfigured { missing, .. } => Some(format!(
                "Set {} in the environment or in secrets.toml and restart the server.",
                missing.join(" and ")
            )),
            MuroError::RateLimited { retry_after } => Some(rate_limit_hint(*retry_after)),
            MuroError::QuotaExceeded { .. } => Some(quota_hint()),
            MuroError::Transport { timed_out: true, .. } => {
                Some("The upstream did not answer in time. Try again shortly.".to_string())
            }
            _ => None,
        }
    }

    /// Whether the error came from the upstream call (as opposed to local state).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            MuroError::RateLimited { .. }
                | MuroError::QuotaExceeded { .. }
                | MuroError::Upstream { .. }
                | MuroError::Transport { .. }
        )
    }

    /// Suggested wait before retrying, for `Retry-After` headers.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MuroError::RateLimited { retry_after } => {
                Some(retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT))
            }
            _ => None,
        }
    }
}

/// Human text describing when a rate-limited upstream can be retried.
pub fn rate_limit_hint(retry_after: Option<Duration>) -> String {
    match retry_after {
        Some(wait) => {
            let minutes = wait.as_secs().div_ceil(60).max(1);
            let unit = if minutes == 1 { "minute" } else { "minutes" };
            format!("Rate limit exceeded. The window resets in about {minutes} {unit}.")
        }
        None => format!(
            "Rate limit exceeded. Wait {} minutes and try again.",
            DEFAULT_RATE_LIMIT_WAIT.as_secs() / 60
        ),
    }
}

/// Human text describing a long-horizon quota reset.
pub fn quota_hint() -> String {
    "Usage quota exhausted. Data refreshes automatically once the quota renews \
     (daily quotas reset at midnight Pacific Time)."
        .to_string()
}

/// Result type alias for Muro operations
pub type Result<T> = std::result::Result<T, MuroError>;
