//! Caching subsystem.
//!
//! - [`CacheEntry`]: one resource's last good upstream payload with its
//!   creation time and TTL; decides [`Freshness`].
//!
//! - [`CacheStore`]: durable key-value storage for entries. [`FileStore`]
//!   persists one JSON file per resource with atomic replace;
//!   [`MemoryStore`] keeps entries in process (tests, throwaway runs).

mod entry;
pub mod memory;
pub mod store;

pub use entry::{CacheEntry, Freshness};
pub use memory::MemoryStore;
pub use store::{CacheStore, FileStore, default_cache_dir};
