//! Telemetry metric name constants.
//!
//! Centralised metric names for muro operations. Consumers install their own
//! `metrics` recorder (e.g. prometheus, statsd); without a recorder installed,
//! all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muro_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `resource`: store key (e.g. "tweets", "youtube-videos")
//! - `cache_state`: response indicator (e.g. "HIT", "STALE-QUOTA"), or
//!   "ERROR" for error responses
//! - `outcome`: upstream classification (e.g. "success", "rate_limited")
//! - `status`: "ok" or "error"

/// Total proxy requests answered.
///
/// Labels: `resource`, `cache_state`.
pub const REQUESTS_TOTAL: &str = "muro_requests_total";

/// Total upstream calls made.
///
/// Labels: `resource`, `outcome`.
pub const UPSTREAM_REQUESTS_TOTAL: &str = "muro_upstream_requests_total";

/// Upstream call duration in seconds.
///
/// Labels: `resource`.
pub const UPSTREAM_DURATION_SECONDS: &str = "muro_upstream_duration_seconds";

/// Total cache writes.
///
/// Labels: `resource`, `status` ("ok" | "error").
pub const STORE_WRITES_TOTAL: &str = "muro_store_writes_total";
