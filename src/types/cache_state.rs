//! Cache-state indicator exposed on every response.

use std::fmt;

use serde::{Serialize, Serializer};

/// How a response was produced, as reported in the `X-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheState {
    /// Served from a fresh entry; upstream not contacted.
    Hit,
    /// Upstream was called (fresh data, or an empty result).
    Miss,
    /// Upstream returned nothing; stale entry served.
    Stale,
    /// Upstream rate-limited; stale entry served.
    StaleRateLimited,
    /// Upstream quota exhausted; stale entry served.
    StaleQuota,
    /// Upstream failed; stale entry served.
    StaleError,
}

impl CacheState {
    /// Header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::Hit => "HIT",
            CacheState::Miss => "MISS",
            CacheState::Stale => "STALE",
            CacheState::StaleRateLimited => "STALE-RATE-LIMITED",
            CacheState::StaleQuota => "STALE-QUOTA",
            CacheState::StaleError => "STALE-ERROR",
        }
    }

    /// Whether the payload came from an expired entry.
    pub fn is_stale(&self) -> bool {
        !matches!(self, CacheState::Hit | CacheState::Miss)
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CacheState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
