//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;

use muro::cache::{CacheEntry, CacheStore, MemoryStore};
use muro::telemetry;
use muro::{
    CacheProxy, FetchParams, MuroError, Resource, ResourceSettings, Result, UpstreamClient,
    UpstreamOutcome,
};

// ============================================================================
// Mocks
// ============================================================================

struct FixedClient(UpstreamOutcome);

#[async_trait]
impl UpstreamClient for FixedClient {
    fn name(&self) -> &str {
        "fixed"
    }

    fn resource(&self) -> Resource {
        Resource::Tweets
    }

    async fn fetch(&self, _params: &FetchParams) -> UpstreamOutcome {
        self.0.clone()
    }
}

struct FullDisk;

impl CacheStore for FullDisk {
    fn name(&self) -> &str {
        "full-disk"
    }

    fn save(&self, _key: &str, _entry: &CacheEntry) -> Result<()> {
        Err(MuroError::Store("no space left on device".to_string()))
    }

    fn load(&self, _key: &str) -> Result<Option<CacheEntry>> {
        Ok(None)
    }

    fn clear(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum counter values for `name` whose labels include `label = value`.
fn counter_with(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| {
            key.key()
                .labels()
                .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Run `scenario` against `proxy` with a local recorder and return what it saw.
///
/// The upstream call runs on a spawned task. A current-thread runtime keeps
/// that task on this thread, where the local recorder is installed.
fn record<F, Fut>(proxy: CacheProxy, scenario: F) -> SnapshotVec
where
    F: FnOnce(CacheProxy) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(scenario(proxy))
    });

    snapshotter.snapshot().into_vec()
}

fn proxy_with(store: Arc<dyn CacheStore>, outcome: UpstreamOutcome) -> CacheProxy {
    CacheProxy::builder()
        .shared_store(store)
        .upstream(
            Arc::new(FixedClient(outcome)),
            ResourceSettings::new(Duration::from_secs(900), 5),
        )
        .build()
        .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn miss_then_hit_records_both_states() {
    let proxy = proxy_with(
        Arc::new(MemoryStore::new()),
        UpstreamOutcome::Success(json!({"data": [{"id": "1"}]})),
    );

    let snapshot = record(proxy, |proxy| async move {
        proxy.get(Resource::Tweets, None).await.unwrap();
        proxy.get(Resource::Tweets, None).await.unwrap();
    });

    let requests = telemetry::REQUESTS_TOTAL;
    assert_eq!(counter_with(&snapshot, requests, "cache_state", "MISS"), 1);
    assert_eq!(counter_with(&snapshot, requests, "cache_state", "HIT"), 1);
    assert_eq!(
        counter_with(&snapshot, telemetry::UPSTREAM_REQUESTS_TOTAL, "outcome", "success"),
        1,
        "a hit must not call the upstream"
    );
    assert_eq!(
        counter_with(&snapshot, telemetry::STORE_WRITES_TOTAL, "status", "ok"),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::UPSTREAM_DURATION_SECONDS));
}

#[test]
fn stale_fallback_records_reason_state() {
    let store = Arc::new(MemoryStore::new());
    let entry = CacheEntry::with_created_at(
        "tweets",
        json!({"data": [{"id": "old"}]}),
        Duration::from_secs(900),
        chrono::Utc::now() - chrono::TimeDelta::hours(2),
    );
    store.save("tweets", &entry).unwrap();
    let proxy = proxy_with(store, UpstreamOutcome::RateLimited { retry_after: None });

    let snapshot = record(proxy, |proxy| async move {
        proxy.get(Resource::Tweets, None).await.unwrap();
    });

    assert_eq!(
        counter_with(
            &snapshot,
            telemetry::REQUESTS_TOTAL,
            "cache_state",
            "STALE-RATE-LIMITED"
        ),
        1
    );
    assert_eq!(
        counter_with(
            &snapshot,
            telemetry::UPSTREAM_REQUESTS_TOTAL,
            "outcome",
            "rate_limited"
        ),
        1
    );
    assert_eq!(
        counter_with(&snapshot, telemetry::STORE_WRITES_TOTAL, "resource", "tweets"),
        0,
        "failures never write"
    );
}

#[test]
fn error_response_is_counted() {
    let proxy = proxy_with(
        Arc::new(MemoryStore::new()),
        UpstreamOutcome::QuotaExceeded {
            message: "daily".into(),
        },
    );

    let snapshot = record(proxy, |proxy| async move {
        assert!(proxy.get(Resource::Tweets, None).await.is_err());
    });

    assert_eq!(
        counter_with(&snapshot, telemetry::REQUESTS_TOTAL, "cache_state", "ERROR"),
        1
    );
}

#[test]
fn failed_write_is_counted() {
    let proxy = proxy_with(
        Arc::new(FullDisk),
        UpstreamOutcome::Success(json!({"data": [{"id": "1"}]})),
    );

    let snapshot = record(proxy, |proxy| async move {
        proxy.get(Resource::Tweets, None).await.unwrap();
    });

    assert_eq!(
        counter_with(&snapshot, telemetry::STORE_WRITES_TOTAL, "status", "error"),
        1
    );
    assert_eq!(
        counter_with(&snapshot, telemetry::REQUESTS_TOTAL, "cache_state", "MISS"),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let proxy = proxy_with(
        Arc::new(MemoryStore::new()),
        UpstreamOutcome::Success(json!({"data": [{"id": "1"}]})),
    );
    proxy.get(Resource::Tweets, None).await.unwrap();
}
