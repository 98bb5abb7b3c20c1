//! In-process store for tests and ephemeral deployments.

use super::{CacheEntry, CacheStore};
use crate::Result;

/// Default maximum number of keys held in memory.
const DEFAULT_MAX_KEYS: u64 = 64;

/// Thread-safe in-memory store. Entries do not survive a restart.
///
/// Backed by a bounded moka cache without TTL eviction: expiry is decided by
/// [`CacheEntry`] itself so stale entries remain available for fallback.
pub struct MemoryStore {
    entries: moka::sync::Cache<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: moka::sync::Cache::new(DEFAULT_MAX_KEYS),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn save(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        self.entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key))
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn save_load_clear() {
        let store = MemoryStore::new();
        let entry = CacheEntry::new("tweets", json!({"data": [1]}), Duration::from_secs(60));

        store.save("tweets", &entry).unwrap();
        assert_eq!(store.load("tweets").unwrap(), Some(entry));
        assert_eq!(store.len(), 1);

        store.clear("tweets").unwrap();
        store.clear("tweets").unwrap();
        assert!(store.load("tweets").unwrap().is_none());
    }
}
