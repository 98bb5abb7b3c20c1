//! Configuration loading for murod and muro.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.muro/config.toml` (user)
//! 3. `/etc/muro/config.toml` (system)
//! 4. Built-in defaults
//!
//! Environment variables are applied on top, once, after the file is loaded.
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.muro/secrets.toml` (user, must be 0600)
//! 2. `/etc/muro/secrets.toml` (system, must be 0600)
//!
//! and fall back to `X_API_BEARER_TOKEN` / `YOUTUBE_API_KEY`.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::cache::default_cache_dir;
use crate::proxy::ResourceSettings;
use crate::types::Resource;
use crate::upstream::{X_DEFAULT_BASE_URL, YOUTUBE_DEFAULT_BASE_URL};
use crate::{MuroError, Result};

/// Sample values shipped in example configs; they count as unset.
const PLACEHOLDERS: &[&str] = &[
    "TU_BEARER_TOKEN_AQUI",
    "TU_USER_ID_AQUI",
    "TU_API_KEY_AQUI",
    "TU_CHANNEL_ID_AQUI",
];

/// Trimmed value, or `None` when empty or a known placeholder.
fn usable(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !PLACEHOLDERS.contains(v))
}

/// First of `names` whose value is [`usable`], trimmed.
fn first_usable(lookup: &impl Fn(&str) -> Option<String>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        let value = lookup(name)?;
        usable(Some(value.as_str())).map(str::to_string)
    })
}

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub x: XConfig,
    #[serde(default)]
    pub youtube: YoutubeConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3000).
    #[serde(default = "default_address")]
    pub address: String,
    /// Allowed CORS origin (default: any).
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_cors_origin() -> String {
    "*".to_string()
}

/// Where cache entries live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One JSON file per resource; survives restarts.
    #[default]
    File,
    /// In-process only.
    Memory,
}

/// Cache store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Store directory (default: `~/.cache/muro`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Upstream request timeout in seconds (default: 10).
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Share one upstream call between concurrent misses (default: false).
    #[serde(default)]
    pub coalesce_misses: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            coalesce_misses: false,
        }
    }
}

impl ProxyConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_timeout() -> u64 {
    10
}

/// X (posts) resource configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct XConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_x_ttl")]
    pub cache_ttl_minutes: u64,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_x_base_url")]
    pub base_url: String,
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            cache_ttl_minutes: default_x_ttl(),
            max_results: default_max_results(),
            base_url: default_x_base_url(),
        }
    }
}

impl XConfig {
    pub fn user_id(&self) -> Option<&str> {
        usable(self.user_id.as_deref())
    }
}

fn default_x_ttl() -> u64 {
    15
}

fn default_x_base_url() -> String {
    X_DEFAULT_BASE_URL.to_string()
}

/// YouTube (videos) resource configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct YoutubeConfig {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_youtube_ttl")]
    pub cache_ttl_minutes: u64,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_youtube_base_url")]
    pub base_url: String,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            channel_id: None,
            cache_ttl_minutes: default_youtube_ttl(),
            max_results: default_max_results(),
            base_url: default_youtube_base_url(),
        }
    }
}

impl YoutubeConfig {
    pub fn channel_id(&self) -> Option<&str> {
        usable(self.channel_id.as_deref())
    }
}

fn default_youtube_ttl() -> u64 {
    30
}

fn default_youtube_base_url() -> String {
    YOUTUBE_DEFAULT_BASE_URL.to_string()
}

fn default_max_results() -> u32 {
    3
}

/// Parse a numeric environment override.
fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        MuroError::Configuration(format!("{name} must be a number, got {value:?}"))
    })
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided, must exist)
    /// 2. `~/.muro/config.toml`
    /// 3. `/etc/muro/config.toml`
    /// 4. Defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::resolve_config_path(explicit_path)? else {
            info!("no config file found, using defaults");
            return Ok(Config::default());
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            MuroError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        info!(path = %path.display(), "loaded config file");
        toml::from_str(&content).map_err(|e| {
            MuroError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path, `None` when no file exists.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MuroError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muro").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/muro/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`; unset or empty variables are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(address) = get("MURO_ADDRESS") {
            self.server.address = address;
        }
        if let Some(port) = get("PORT") {
            let port: u16 = parse_env("PORT", &port)?;
            let host = self
                .server
                .address
                .rsplit_once(':')
                .map_or(self.server.address.as_str(), |(host, _)| host);
            self.server.address = format!("{host}:{port}");
        }
        if let Some(origin) = get("CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Some(dir) = get("MURO_CACHE_DIR") {
            self.cache.dir = Some(PathBuf::from(dir));
        }

        if let Some(user_id) = get("X_API_USER_ID").or_else(|| get("TWITTER_USER_ID")) {
            self.x.user_id = Some(user_id);
        }
        if let Some(v) = get("X_API_MAX_RESULTS") {
            self.x.max_results = parse_env("X_API_MAX_RESULTS", &v)?;
        }
        if let Some(v) = get("X_CACHE_TTL_MINUTES") {
            self.x.cache_ttl_minutes = parse_env("X_CACHE_TTL_MINUTES", &v)?;
        }

        if let Some(channel_id) = get("YOUTUBE_CHANNEL_ID") {
            self.youtube.channel_id = Some(channel_id);
        }
        if let Some(v) = get("YOUTUBE_MAX_RESULTS") {
            self.youtube.max_results = parse_env("YOUTUBE_MAX_RESULTS", &v)?;
        }
        if let Some(v) = get("YOUTUBE_CACHE_TTL_MINUTES") {
            self.youtube.cache_ttl_minutes = parse_env("YOUTUBE_CACHE_TTL_MINUTES", &v)?;
        }
        Ok(())
    }

    /// Reject values that cannot work, before anything is served.
    pub fn validate(&self) -> Result<()> {
        if self.proxy.request_timeout_secs == 0 {
            return Err(MuroError::Configuration(
                "proxy.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        for resource in Resource::ALL {
            let (ttl_minutes, max_results) = match resource {
                Resource::Tweets => (self.x.cache_ttl_minutes, self.x.max_results),
                Resource::YoutubeVideos => {
                    (self.youtube.cache_ttl_minutes, self.youtube.max_results)
                }
            };
            if ttl_minutes == 0 {
                return Err(MuroError::Configuration(format!(
                    "cache TTL for {resource} must be greater than zero"
                )));
            }
            let limit = resource.max_results_limit();
            if !(1..=limit).contains(&max_results) {
                return Err(MuroError::Configuration(format!(
                    "max_results for {resource} must be between 1 and {limit}, got {max_results}"
                )));
            }
        }
        Ok(())
    }

    /// TTL and default page size for `resource`.
    pub fn resource_settings(&self, resource: Resource) -> ResourceSettings {
        let (ttl_minutes, max_results) = match resource {
            Resource::Tweets => (self.x.cache_ttl_minutes, self.x.max_results),
            Resource::YoutubeVideos => (self.youtube.cache_ttl_minutes, self.youtube.max_results),
        };
        ResourceSettings::new(
            Duration::from_secs(ttl_minutes.saturating_mul(60)),
            max_results,
        )
    }
}

/// Secrets configuration (upstream credentials).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub x: Option<XSecret>,
    #[serde(default)]
    pub youtube: Option<YoutubeSecret>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XSecret {
    pub bearer_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YoutubeSecret {
    pub api_key: String,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.muro/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/muro/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (credentials may come from env vars).
    pub fn load() -> Result<Self> {
        // Try user secrets first
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".muro").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        // Try system secrets
        let system_secrets = PathBuf::from("/etc/muro/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuroError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MuroError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    pub fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            MuroError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(MuroError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Fill credentials missing from the file from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Fill credentials missing from the file from `lookup`.
    ///
    /// Empty or placeholder values are skipped, so they never hide a usable
    /// legacy alias.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.x_bearer_token().is_none() {
            if let Some(token) =
                first_usable(&lookup, &["X_API_BEARER_TOKEN", "TWITTER_BEARER_TOKEN"])
            {
                self.x = Some(XSecret {
                    bearer_token: token,
                });
            }
        }
        if self.youtube_api_key().is_none() {
            if let Some(api_key) = first_usable(&lookup, &["YOUTUBE_API_KEY"]) {
                self.youtube = Some(YoutubeSecret { api_key });
            }
        }
    }

    pub fn x_bearer_token(&self) -> Option<&str> {
        usable(self.x.as_ref().map(|s| s.bearer_token.as_str()))
    }

    pub fn youtube_api_key(&self) -> Option<&str> {
        usable(self.youtube.as_ref().map(|s| s.api_key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.address, "127.0.0.1:3000");
        assert_eq!(config.server.cors_origin, "*");
        assert_eq!(config.proxy.request_timeout_secs, 10);
        assert!(!config.proxy.coalesce_misses);
        assert_eq!(config.x.cache_ttl_minutes, 15);
        assert_eq!(config.youtube.cache_ttl_minutes, 30);
        assert_eq!(config.x.max_results, 3);
        assert_eq!(config.youtube.max_results, 3);
        assert_eq!(config.cache.backend, StoreBackend::File);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [server]
            address = "0.0.0.0:8080"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.address, "0.0.0.0:8080");
        // Defaults preserved
        assert_eq!(config.x.cache_ttl_minutes, 15);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            address = "127.0.0.1:3000"
            cors_origin = "https://example.com"

            [cache]
            backend = "memory"
            dir = "/var/cache/muro"

            [proxy]
            request_timeout_secs = 5
            coalesce_misses = true

            [x]
            user_id = "12345"
            cache_ttl_minutes = 20
            max_results = 10

            [youtube]
            channel_id = "UC123"
            cache_ttl_minutes = 60
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.backend, StoreBackend::Memory);
        assert_eq!(config.cache.dir(), PathBuf::from("/var/cache/muro"));
        assert_eq!(config.proxy.request_timeout(), Duration::from_secs(5));
        assert!(config.proxy.coalesce_misses);
        assert_eq!(config.x.user_id(), Some("12345"));
        assert_eq!(config.youtube.channel_id(), Some("UC123"));
        assert_eq!(
            config.resource_settings(Resource::Tweets),
            ResourceSettings::new(Duration::from_secs(1200), 10)
        );
        assert_eq!(config.youtube.max_results, 3);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config
            .apply_env_from(env(&[
                ("PORT", "8081"),
                ("X_API_USER_ID", "42"),
                ("X_CACHE_TTL_MINUTES", "5"),
                ("YOUTUBE_MAX_RESULTS", "7"),
                ("MURO_CACHE_DIR", "/tmp/muro"),
            ]))
            .unwrap();
        assert_eq!(config.server.address, "127.0.0.1:8081");
        assert_eq!(config.x.user_id(), Some("42"));
        assert_eq!(config.x.cache_ttl_minutes, 5);
        assert_eq!(config.youtube.max_results, 7);
        assert_eq!(config.cache.dir(), PathBuf::from("/tmp/muro"));
    }

    #[test]
    fn non_numeric_env_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env_from(env(&[("X_CACHE_TTL_MINUTES", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("X_CACHE_TTL_MINUTES"));
    }

    #[test]
    fn validate_rejects_zero_ttl_and_oversized_page() {
        let mut config = Config::default();
        config.youtube.cache_ttl_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.youtube.max_results = 51;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("between 1 and 50"), "{err}");
    }

    #[test]
    fn placeholders_count_as_missing() {
        let mut config = Config::default();
        config.x.user_id = Some("TU_USER_ID_AQUI".to_string());
        assert_eq!(config.x.user_id(), None);

        let secrets = Secrets {
            x: Some(XSecret {
                bearer_token: "TU_BEARER_TOKEN_AQUI".to_string(),
            }),
            youtube: Some(YoutubeSecret {
                api_key: "  ".to_string(),
            }),
        };
        assert_eq!(secrets.x_bearer_token(), None);
        assert_eq!(secrets.youtube_api_key(), None);
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [x]
            bearer_token = "AAAA-test"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.x_bearer_token(), Some("AAAA-test"));
        assert!(secrets.youtube.is_none());
    }

    #[test]
    fn secrets_fall_back_to_env() {
        let mut secrets = Secrets {
            x: Some(XSecret {
                bearer_token: "from-file".to_string(),
            }),
            youtube: None,
        };
        secrets.apply_env_from(env(&[
            ("X_API_BEARER_TOKEN", "from-env"),
            ("YOUTUBE_API_KEY", "yt-key"),
        ]));
        // File wins over env
        assert_eq!(secrets.x_bearer_token(), Some("from-file"));
        assert_eq!(secrets.youtube_api_key(), Some("yt-key"));
    }

    #[test]
    fn blank_env_credentials_do_not_hide_aliases() {
        let mut secrets = Secrets::default();
        secrets.apply_env_from(env(&[
            ("X_API_BEARER_TOKEN", ""),
            ("TWITTER_BEARER_TOKEN", "real-token"),
            ("YOUTUBE_API_KEY", "TU_API_KEY_AQUI"),
        ]));
        assert_eq!(secrets.x_bearer_token(), Some("real-token"));
        assert_eq!(secrets.youtube_api_key(), None);
        assert!(secrets.youtube.is_none());

        let mut secrets = Secrets::default();
        secrets.apply_env_from(env(&[
            ("X_API_BEARER_TOKEN", "TU_BEARER_TOKEN_AQUI"),
            ("TWITTER_BEARER_TOKEN", "  legacy  "),
        ]));
        assert_eq!(secrets.x_bearer_token(), Some("legacy"));
    }

    #[test]
    fn huge_ttl_saturates() {
        let mut config = Config::default();
        config.x.cache_ttl_minutes = u64::MAX;
        config.validate().unwrap();
        let settings = config.resource_settings(Resource::Tweets);
        assert_eq!(settings.ttl, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_secrets_are_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[youtube]\napi_key = \"k\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(Secrets::check_permissions(&path).is_err());

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        Secrets::check_permissions(&path).unwrap();
        let secrets = Secrets::load_from_file(&path).unwrap();
        assert_eq!(secrets.youtube_api_key(), Some("k"));
    }
}
