//! Cache entry value object and freshness rules.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Freshness of the entry for a resource at a given instant.
///
/// Exactly one variant applies to any (possibly missing) entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Has a payload and `now <= expires_at`.
    Fresh,
    /// Has a payload and `now > expires_at`.
    Stale,
    /// Missing, or present without a payload.
    Absent,
}

impl Freshness {
    /// Classify an optional entry.
    pub fn of(entry: Option<&CacheEntry>, now: DateTime<Utc>) -> Self {
        entry.map_or(Freshness::Absent, |e| e.freshness_at(now))
    }
}

/// Last successful upstream response for one resource.
///
/// The TTL is captured when the entry is created; changing configuration later
/// does not move an existing entry's expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Store key of the resource this entry mirrors.
    pub resource: String,
    /// Upstream response body, passed through verbatim.
    pub payload: Value,
    /// When the payload was fetched.
    pub created_at: DateTime<Utc>,
    /// Lifetime in seconds, fixed at creation.
    pub ttl_seconds: u64,
}

impl CacheEntry {
    /// Create an entry timestamped now.
    pub fn new(resource: impl Into<String>, payload: Value, ttl: Duration) -> Self {
        Self::with_created_at(resource, payload, ttl, Utc::now())
    }

    /// Create an entry with an explicit creation time.
    pub fn with_created_at(
        resource: impl Into<String>,
        payload: Value,
        ttl: Duration,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource: resource.into(),
            payload,
            created_at,
            ttl_seconds: ttl.as_secs(),
        }
    }

    /// Configured lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// `created_at + ttl`, saturating at the maximum representable time.
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| self.created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// A null payload never counts as cached data.
    pub fn has_payload(&self) -> bool {
        !self.payload.is_null()
    }

    /// Time since creation; zero if the clock went backwards.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Time left before expiry, `None` once expired.
    pub fn expires_in_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let expires_at = self.expires_at();
        if now > expires_at {
            return None;
        }
        Some((expires_at - now).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn freshness_at(&self, now: DateTime<Utc>) -> Freshness {
        if !self.has_payload() {
            Freshness::Absent
        } else if now <= self.expires_at() {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.freshness_at(now) == Freshness::Fresh
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.freshness_at(now) == Freshness::Stale
    }
}
