//! Persistent store for cache entries.
//!
//! One JSON file per resource under the cache directory
//! (`~/.cache/muro/<key>.json` by default). Writes go to a unique temporary
//! file and are renamed over the target, so a concurrent reader sees either
//! the previous entry or the new one, never a partial write.
//!
//! # On-disk format
//!
//! ```json
//! {
//!   "version": 1,
//!   "resource": "tweets",
//!   "created_at": "2026-10-18T12:00:00Z",
//!   "ttl_seconds": 900,
//!   "expires_at": "2026-10-18T12:15:00Z",
//!   "payload": { "data": [ ... ] }
//! }
//! ```
//!
//! `expires_at` is informational; freshness is always recomputed from
//! `created_at + ttl_seconds`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::CacheEntry;
use crate::{MuroError, Result};

/// Current on-disk record version.
const RECORD_VERSION: u32 = 1;

/// Durable key-value storage holding one entry per resource.
///
/// Entries are always replaced wholesale. `load` never fails because of bad
/// content: corrupt or unreadable records are logged and read as absent.
pub trait CacheStore: Send + Sync {
    /// Backend name for logging/debugging.
    fn name(&self) -> &str;

    /// Replace the entry for `key`.
    fn save(&self, key: &str, entry: &CacheEntry) -> Result<()>;

    /// Read the entry for `key`, `None` if never written or unusable.
    fn load(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Remove the entry for `key`. Clearing a missing key succeeds.
    fn clear(&self, key: &str) -> Result<()>;
}

/// Default store directory: `~/.cache/muro`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("muro")
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    version: u32,
    #[serde(flatten)]
    entry: CacheEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// Decode a stored record, checking version and key.
fn decode_record(key: &str, json: &str) -> Result<CacheEntry> {
    let record: StoredRecord = serde_json::from_str(json)
        .map_err(|e| MuroError::StoreCorrupt(format!("failed to parse entry JSON: {e}")))?;
    if record.version > RECORD_VERSION {
        return Err(MuroError::StoreCorrupt(format!(
            "unsupported entry version {} (max supported: {RECORD_VERSION})",
            record.version
        )));
    }
    if record.entry.resource != key {
        return Err(MuroError::StoreCorrupt(format!(
            "entry belongs to '{}', expected '{key}'",
            record.entry.resource
        )));
    }
    Ok(record.entry)
}

/// File-backed store, one JSON document per key.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
    tmp_seq: AtomicU64,
}

impl FileStore {
    /// Store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
            tmp_seq: AtomicU64::new(0),
        }
    }

    /// Store rooted at [`default_cache_dir()`].
    pub fn with_default_dir() -> Self {
        Self::new(default_cache_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `key`.
    pub fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(MuroError::Store(format!("invalid cache key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn tmp_path(&self, path: &Path) -> PathBuf {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()))
    }
}

impl CacheStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    fn save(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            MuroError::Store(format!(
                "failed to create cache dir {}: {e}",
                self.dir.display()
            ))
        })?;

        let record = StoredRecord {
            version: RECORD_VERSION,
            entry: entry.clone(),
            expires_at: Some(entry.expires_at()),
        };
        let json = serde_json::to_string_pretty(&record)?;

        // Write to tmp file first, then rename for atomicity
        let tmp_path = self.tmp_path(&path);
        std::fs::write(&tmp_path, &json).map_err(|e| {
            MuroError::Store(format!(
                "failed to write cache file {}: {e}",
                tmp_path.display()
            ))
        })?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(MuroError::Store(format!(
                "failed to rename cache file {} → {}: {e}",
                tmp_path.display(),
                path.display()
            )));
        }
        debug!(key, path = %path.display(), "cache entry committed");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache entry");
                return Ok(None);
            }
        };
        match decode_record(key, &content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry");
                Ok(None)
            }
        }
    }

    fn clear(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MuroError::Store(format!(
                "failed to remove cache file {}: {e}",
                path.display()
            ))),
        }
    }
}
