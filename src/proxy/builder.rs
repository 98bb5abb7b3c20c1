//! Builder for configuring proxy instances

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::{CacheProxy, ResourceSlot, ResourceSettings, Upstream};
use crate::cache::CacheStore;
use crate::types::Resource;
use crate::upstream::UpstreamClient;
use crate::{MuroError, Result};

/// Extra time the orchestrator allows on top of the client's own timeout.
pub const FETCH_GRACE: Duration = Duration::from_secs(5);

/// Builder for [`CacheProxy`].
pub struct CacheProxyBuilder {
    store: Option<Arc<dyn CacheStore>>,
    resources: BTreeMap<Resource, (ResourceSettings, Upstream)>,
    fetch_timeout: Option<Duration>,
    coalesce_misses: bool,
}

impl CacheProxyBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            resources: BTreeMap::new(),
            fetch_timeout: None,
            coalesce_misses: false,
        }
    }

    /// Use `store` for all resources.
    pub fn store(self, store: impl CacheStore + 'static) -> Self {
        self.shared_store(Arc::new(store))
    }

    /// Use an already shared store (e.g. one also held by a test).
    pub fn shared_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Serve the client's resource with the given TTL and page size.
    pub fn upstream(mut self, client: Arc<dyn UpstreamClient>, settings: ResourceSettings) -> Self {
        self.resources
            .insert(client.resource(), (settings, Upstream::Ready(client)));
        self
    }

    /// Register a resource whose credentials are missing.
    ///
    /// Requests for it fail with `NotConfigured` before touching the store.
    pub fn unconfigured(
        mut self,
        resource: Resource,
        settings: ResourceSettings,
        missing: Vec<&'static str>,
    ) -> Self {
        self.resources
            .insert(resource, (settings, Upstream::Missing(missing)));
        self
    }

    /// Upper bound on one fetch-and-commit, including the store write.
    ///
    /// Defaults to the upstream client timeout plus [`FETCH_GRACE`].
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Let concurrent misses for one resource share a single upstream call.
    pub fn coalesce_misses(mut self, enabled: bool) -> Self {
        self.coalesce_misses = enabled;
        self
    }

    /// Build the proxy.
    pub fn build(self) -> Result<CacheProxy> {
        let store = self
            .store
            .ok_or_else(|| MuroError::Configuration("no cache store configured".to_string()))?;

        if self.resources.is_empty() {
            return Err(MuroError::Configuration(
                "no resource registered".to_string(),
            ));
        }

        if let Some((resource, _)) = self
            .resources
            .iter()
            .find(|(_, (settings, _))| settings.ttl.is_zero())
        {
            return Err(MuroError::Configuration(format!(
                "cache TTL for {resource} must be greater than zero"
            )));
        }

        let resources = self
            .resources
            .into_iter()
            .map(|(resource, (settings, upstream))| {
                (
                    resource,
                    ResourceSlot {
                        settings,
                        upstream,
                        in_flight: Arc::new(tokio::sync::Mutex::new(())),
                    },
                )
            })
            .collect();

        Ok(CacheProxy {
            store,
            resources,
            fetch_timeout: self
                .fetch_timeout
                .unwrap_or(crate::upstream::DEFAULT_TIMEOUT + FETCH_GRACE),
            coalesce_misses: self.coalesce_misses,
        })
    }
}

impl Default for CacheProxyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
