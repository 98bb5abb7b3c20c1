//! HTTP service and shared wiring.
//!
//! This module provides:
//! - Configuration types (`config`), shared by the daemon and the CLI
//! - The axum router (`routes`, server-only)
//! - [`build_proxy`], which turns configuration into a ready [`CacheProxy`]

pub mod config;
#[cfg(feature = "server")]
pub mod routes;

pub use config::{Config, Secrets, StoreBackend};
#[cfg(feature = "server")]
pub use routes::{AppState, router};

use std::sync::Arc;

use tracing::info;

use crate::Result;
use crate::cache::{FileStore, MemoryStore};
use crate::proxy::{CacheProxy, FETCH_GRACE};
use crate::types::Resource;
use crate::upstream::{XClient, YouTubeClient};

/// Build a [`CacheProxy`] from configuration.
///
/// A resource missing any credential is registered as unconfigured so its
/// requests fail with `NotConfigured` instead of calling out with empty
/// credentials.
pub fn build_proxy(config: &Config, secrets: &Secrets) -> Result<CacheProxy> {
    let timeout = config.proxy.request_timeout();
    let mut builder = CacheProxy::builder()
        .fetch_timeout(timeout + FETCH_GRACE)
        .coalesce_misses(config.proxy.coalesce_misses);

    builder = match config.cache.backend {
        StoreBackend::File => {
            let dir = config.cache.dir();
            info!(dir = %dir.display(), "using file cache store");
            builder.store(FileStore::new(dir))
        }
        StoreBackend::Memory => {
            info!("using in-memory cache store");
            builder.store(MemoryStore::new())
        }
    };

    // Posts
    let settings = config.resource_settings(Resource::Tweets);
    builder = match (secrets.x_bearer_token(), config.x.user_id()) {
        (Some(token), Some(user_id)) => {
            let client = XClient::with_base_url(token, user_id, &config.x.base_url, timeout)?;
            builder.upstream(Arc::new(client), settings)
        }
        (token, user_id) => {
            let mut missing = Vec::new();
            if token.is_none() {
                missing.push("X_API_BEARER_TOKEN");
            }
            if user_id.is_none() {
                missing.push("X_API_USER_ID");
            }
            builder.unconfigured(Resource::Tweets, settings, missing)
        }
    };

    // Videos
    let settings = config.resource_settings(Resource::YoutubeVideos);
    builder = match (secrets.youtube_api_key(), config.youtube.channel_id()) {
        (Some(api_key), Some(channel_id)) => {
            let client = YouTubeClient::with_base_url(
                api_key,
                channel_id,
                &config.youtube.base_url,
                timeout,
            )?;
            builder.upstream(Arc::new(client), settings)
        }
        (api_key, channel_id) => {
            let mut missing = Vec::new();
            if api_key.is_none() {
                missing.push("YOUTUBE_API_KEY");
            }
            if channel_id.is_none() {
                missing.push("YOUTUBE_CHANNEL_ID");
            }
            builder.unconfigured(Resource::YoutubeVideos, settings, missing)
        }
    };

    builder.build()
}
