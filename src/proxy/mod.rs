//! Cache-aside orchestration with stale fallback.
//!
//! [`CacheProxy::get`] answers one request for one resource:
//!
//! 1. Unconfigured resource → `NotConfigured`, before any store or upstream access.
//! 2. Fresh entry → served as `HIT`; the upstream is not called.
//! 3. Otherwise exactly one upstream call. A non-empty result replaces the
//!    entry and is served as `MISS`.
//! 4. Any other outcome falls back to the stored entry (`STALE*`) when one
//!    exists. Without one, an empty result becomes "no content" and a failure
//!    becomes the matching error.
//!
//! The upstream call and the store write run on a spawned task, so a client
//! disconnecting mid-request never leaves a fetched payload uncommitted.

mod builder;
mod outcome;

pub use builder::{CacheProxyBuilder, FETCH_GRACE};
pub use outcome::{CacheStatus, ProxyOutcome, ResourceStatus, StaleReason};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheEntry, CacheStore, Freshness};
use crate::telemetry;
use crate::types::{FetchParams, Resource, UpstreamOutcome};
use crate::upstream::UpstreamClient;
use crate::{MuroError, Result};

/// Per-resource cache lifetime and default page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSettings {
    pub ttl: Duration,
    pub default_max_results: u32,
}

impl ResourceSettings {
    pub fn new(ttl: Duration, default_max_results: u32) -> Self {
        Self {
            ttl,
            default_max_results,
        }
    }

    /// 15 minutes for posts, 30 for videos; three items each.
    pub fn defaults_for(resource: Resource) -> Self {
        let minutes = match resource {
            Resource::Tweets => 15,
            Resource::YoutubeVideos => 30,
        };
        Self::new(Duration::from_secs(minutes * 60), 3)
    }
}

pub(crate) enum Upstream {
    Ready(Arc<dyn UpstreamClient>),
    Missing(Vec<&'static str>),
}

pub(crate) struct ResourceSlot {
    settings: ResourceSettings,
    upstream: Upstream,
    /// Held across the miss path when misses are coalesced.
    in_flight: Arc<tokio::sync::Mutex<()>>,
}

impl ResourceSlot {
    fn client(&self, resource: Resource) -> Result<&Arc<dyn UpstreamClient>> {
        match &self.upstream {
            Upstream::Ready(client) => Ok(client),
            Upstream::Missing(missing) => Err(MuroError::NotConfigured {
                resource: resource.key().to_string(),
                missing: missing.clone(),
            }),
        }
    }

    fn missing(&self) -> Vec<&'static str> {
        match &self.upstream {
            Upstream::Ready(_) => Vec::new(),
            Upstream::Missing(missing) => missing.clone(),
        }
    }
}

/// Serves upstream resources from a shared store, calling out only on expiry.
pub struct CacheProxy {
    store: Arc<dyn CacheStore>,
    resources: BTreeMap<Resource, ResourceSlot>,
    fetch_timeout: Duration,
    coalesce_misses: bool,
}

impl CacheProxy {
    /// Create a new builder for configuring the proxy.
    pub fn builder() -> CacheProxyBuilder {
        CacheProxyBuilder::new()
    }

    /// Registered resources, in a stable order.
    pub fn resources(&self) -> impl Iterator<Item = Resource> + '_ {
        self.resources.keys().copied()
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Whether every registered resource has credentials.
    pub fn is_configured(&self) -> bool {
        self.resources
            .values()
            .all(|slot| matches!(slot.upstream, Upstream::Ready(_)))
    }

    // ========================================================================
    // Request path
    // ========================================================================

    /// Answer one request for `resource`.
    ///
    /// `max_results` overrides the configured page size and is clamped to the
    /// upstream's accepted range. It only affects a fetch; a fresh entry is
    /// served as stored.
    #[instrument(skip_all, fields(resource = %resource, max_results = ?max_results))]
    pub async fn get(&self, resource: Resource, max_results: Option<u32>) -> Result<ProxyOutcome> {
        let result = self.resolve(resource, max_results).await;
        let cache_state = match &result {
            Ok(outcome) => outcome.cache_state().as_str(),
            Err(_) => "ERROR",
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "resource" => resource.key(),
            "cache_state" => cache_state,
        )
        .increment(1);
        result
    }

    async fn resolve(&self, resource: Resource, max_results: Option<u32>) -> Result<ProxyOutcome> {
        let slot = self.slot(resource)?;
        let client = Arc::clone(slot.client(resource)?);
        let params = FetchParams::for_resource(
            resource,
            max_results.unwrap_or(slot.settings.default_max_results),
        );

        if let Some(hit) = self.fresh_hit(resource) {
            return Ok(hit);
        }

        // Whoever held the lock before us may have refreshed the entry.
        let flight = if self.coalesce_misses {
            let guard = Arc::clone(&slot.in_flight).lock_owned().await;
            if let Some(hit) = self.fresh_hit(resource) {
                return Ok(hit);
            }
            Some(guard)
        } else {
            None
        };

        debug!(max_results = params.max_results, "cache miss, calling upstream");
        let outcome = self
            .fetch_and_commit(resource, client, params, slot.settings.ttl, flight)
            .await;

        if let UpstreamOutcome::Success(payload) = outcome {
            return Ok(ProxyOutcome::Fetched { payload });
        }

        let fallback = self.load_entry(resource).filter(CacheEntry::has_payload);
        let Some(entry) = fallback else {
            return match outcome.to_error() {
                Some(err) => {
                    warn!(error = %err, "upstream failed and no cached data is available");
                    Err(err)
                }
                None => {
                    info!("upstream returned no items and nothing is cached");
                    Ok(ProxyOutcome::NoContent)
                }
            };
        };

        let Some(reason) = StaleReason::from_outcome(outcome) else {
            return Err(MuroError::Store(format!(
                "unexpected upstream outcome for {resource}"
            )));
        };
        let age = entry.age_at(Utc::now());
        warn!(
            cache_state = reason.cache_state().as_str(),
            age_secs = age.as_secs(),
            "serving stale cache entry"
        );
        Ok(ProxyOutcome::Stale {
            payload: entry.payload,
            age,
            reason,
        })
    }

    fn slot(&self, resource: Resource) -> Result<&ResourceSlot> {
        self.resources
            .get(&resource)
            .ok_or_else(|| MuroError::NotConfigured {
                resource: resource.key().to_string(),
                missing: vec!["upstream client"],
            })
    }

    /// The stored entry, if it is fresh right now.
    fn fresh_hit(&self, resource: Resource) -> Option<ProxyOutcome> {
        let entry = self.load_entry(resource)?;
        let now = Utc::now();
        let expires_in = entry.expires_in_at(now)?;
        if !entry.is_fresh_at(now) {
            return None;
        }
        let age = entry.age_at(now);
        debug!(age_secs = age.as_secs(), expires_in_secs = expires_in.as_secs(), "cache hit");
        Some(ProxyOutcome::Hit {
            payload: entry.payload,
            age,
            expires_in,
        })
    }

    /// Store read; a failing store reads as empty.
    fn load_entry(&self, resource: Resource) -> Option<CacheEntry> {
        match self.store.load(resource.key()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "cache read failed");
                None
            }
        }
    }

    /// One upstream call, committing a non-empty result before returning.
    ///
    /// Runs detached: dropping the returned future does not cancel the call
    /// or the write. The coalescing guard, if any, is held until the write is
    /// done, so waiters behind a dropped request still see its entry.
    async fn fetch_and_commit(
        &self,
        resource: Resource,
        client: Arc<dyn UpstreamClient>,
        params: FetchParams,
        ttl: Duration,
        flight: Option<OwnedMutexGuard<()>>,
    ) -> UpstreamOutcome {
        let store = Arc::clone(&self.store);
        let limit = self.fetch_timeout;

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let outcome = match tokio::time::timeout(limit, client.fetch(&params)).await {
                Ok(outcome) => outcome,
                Err(_) => UpstreamOutcome::TransportError {
                    message: format!("{} did not respond within {}s", client.name(), limit.as_secs()),
                    timed_out: true,
                },
            };
            record_upstream(resource, &outcome, start);

            if let UpstreamOutcome::Success(payload) = &outcome {
                commit(store.as_ref(), resource, payload, ttl);
            }
            drop(flight);
            outcome
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => UpstreamOutcome::TransportError {
                message: format!("upstream task failed: {e}"),
                timed_out: false,
            },
        }
    }

    // ========================================================================
    // Operator surface
    // ========================================================================

    /// Configuration and cache state of every registered resource.
    pub fn status(&self) -> Vec<ResourceStatus> {
        let now = Utc::now();
        self.resources
            .iter()
            .map(|(&resource, slot)| {
                let entry = self.load_entry(resource);
                ResourceStatus {
                    resource,
                    configured: matches!(slot.upstream, Upstream::Ready(_)),
                    missing: slot.missing(),
                    cache: CacheStatus::of(entry.as_ref(), now),
                }
            })
            .collect()
    }

    /// Log what the store holds for each resource, as seen at startup.
    pub fn warm(&self) -> Vec<ResourceStatus> {
        let report = self.status();
        for status in &report {
            let freshness = match (status.cache.has_cache, status.cache.is_valid) {
                (true, true) => Freshness::Fresh,
                (true, false) => Freshness::Stale,
                (false, _) => Freshness::Absent,
            };
            if !status.configured {
                warn!(
                    resource = %status.resource,
                    missing = %status.missing.join(", "),
                    "resource not configured"
                );
            }
            match freshness {
                Freshness::Fresh => info!(
                    resource = %status.resource,
                    expires_in_secs = status.cache.expires_in.unwrap_or(0),
                    "cached entry is fresh"
                ),
                Freshness::Stale => info!(
                    resource = %status.resource,
                    age_secs = status.cache.age_seconds.unwrap_or(0),
                    "cached entry is stale; next request refreshes it"
                ),
                Freshness::Absent => info!(resource = %status.resource, "no cached entry"),
            }
        }
        report
    }

    /// The stored entry for `resource`, fresh or not.
    pub fn peek(&self, resource: Resource) -> Result<CacheEntry> {
        self.store
            .load(resource.key())?
            .filter(CacheEntry::has_payload)
            .ok_or_else(|| MuroError::NoStaleDataAvailable(resource.key().to_string()))
    }

    /// Drop the stored entry for `resource`; the next request goes upstream.
    pub fn clear(&self, resource: Resource) -> Result<()> {
        self.store.clear(resource.key())?;
        info!(resource = %resource, "cache entry cleared");
        Ok(())
    }
}

/// Persist a fetched payload. A failed write is logged; the payload is still served.
fn commit(store: &dyn CacheStore, resource: Resource, payload: &Value, ttl: Duration) {
    let entry = CacheEntry::new(resource.key(), payload.clone(), ttl);
    let status = match store.save(resource.key(), &entry) {
        Ok(()) => {
            info!(resource = %resource, ttl_secs = ttl.as_secs(), "cache entry updated");
            "ok"
        }
        Err(e) => {
            warn!(resource = %resource, store = store.name(), error = %e, "cache write failed");
            "error"
        }
    };
    metrics::counter!(telemetry::STORE_WRITES_TOTAL,
        "resource" => resource.key(),
        "status" => status,
    )
    .increment(1);
}

fn record_upstream(resource: Resource, outcome: &UpstreamOutcome, start: Instant) {
    metrics::counter!(telemetry::UPSTREAM_REQUESTS_TOTAL,
        "resource" => resource.key(),
        "outcome" => outcome.label(),
    )
    .increment(1);
    metrics::histogram!(telemetry::UPSTREAM_DURATION_SECONDS,
        "resource" => resource.key(),
    )
    .record(start.elapsed().as_secs_f64());
}
