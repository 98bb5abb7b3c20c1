//! Muro - caching proxy for social-media read APIs
//!
//! Muro sits between a site and two upstream read APIs (X posts and YouTube
//! uploads). Each resource is mirrored by one persisted cache entry. Requests
//! are answered from the entry while it is fresh; once it expires the
//! upstream is called, and if the upstream cannot deliver (rate limit,
//! quota, outage, empty page) the expired entry is served instead of an
//! error.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use muro::{CacheProxy, FileStore, Resource, ResourceSettings, XClient};
//!
//! #[tokio::main]
//! async fn main() -> muro::Result<()> {
//!     let x = XClient::new("bearer-token", "2244994945")?;
//!     let proxy = CacheProxy::builder()
//!         .store(FileStore::with_default_dir())
//!         .upstream(Arc::new(x), ResourceSettings::defaults_for(Resource::Tweets))
//!         .build()?;
//!
//!     let outcome = proxy.get(Resource::Tweets, None).await?;
//!     println!("{}: {:?}", outcome.cache_state(), outcome.payload());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod presenter;
pub mod proxy;
#[cfg(any(feature = "server", feature = "cli"))]
pub mod server;
pub mod telemetry;
pub mod types;
pub mod upstream;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheEntry, CacheStore, FileStore, Freshness, MemoryStore};
pub use error::{MuroError, Result};
pub use presenter::{PresentedResponse, present};
pub use proxy::{
    CacheProxy, CacheProxyBuilder, CacheStatus, ProxyOutcome, ResourceSettings, ResourceStatus,
    StaleReason,
};
pub use types::{CacheState, FetchParams, Resource, UpstreamOutcome};
pub use upstream::{UpstreamClient, XClient, YouTubeClient};
pub use version::{PKG_NAME, PKG_VERSION, version_string};
