use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use tagcache::CacheOptions;
use tagcache_store_redis::RedisStoreConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Redis backing store
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Stats snapshot cadence and history size
    #[serde(default)]
    pub stats: StatsSettings,
    /// Admin API rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.redis.enabled && self.redis.url.is_empty() {
            return Err("redis.enabled=true requires redis.url".into());
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.cache.key_prefix.is_empty() {
            return Err("cache.key_prefix must not be empty".into());
        }
        if self.cache.default_ttl_secs == 0 {
            return Err("cache.default_ttl_secs must be > 0".into());
        }
        if self.stats.snapshot_interval_secs == 0 {
            return Err("stats.snapshot_interval_secs must be > 0".into());
        }
        if self.stats.history_capacity == 0 {
            return Err("stats.history_capacity must be > 0".into());
        }
        if self.rate_limit.enabled
            && (self.rate_limit.admin_requests_per_window == 0 || self.rate_limit.window_secs == 0)
        {
            return Err("rate_limit window and admin_requests_per_window must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.stats.snapshot_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Use Redis as the backing store (falls back to in-memory without it)
    /// Default: false (single-instance deployments)
    #[serde(default)]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisConfig {
    pub fn store_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            url: self.url.clone(),
            pool_size: self.pool_size,
            timeout_ms: self.timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Physical key prefix for entries and tag indexes
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// TTL used when a caller does not pick one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Whether default options refresh stale entries in the background
    #[serde(default)]
    pub stale_while_revalidate: bool,
}

fn default_key_prefix() -> String {
    "cache:".to_string()
}

fn default_ttl_secs() -> u64 {
    300 // 5 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            default_ttl_secs: default_ttl_secs(),
            stale_while_revalidate: false,
        }
    }
}

impl CacheConfig {
    /// Cache options carrying the configured SWR setting and `tags`.
    pub fn options<I, S>(&self, tags: I) -> CacheOptions
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CacheOptions::new()
            .with_tags(tags)
            .with_stale_while_revalidate(self.stale_while_revalidate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSettings {
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_snapshot_interval_secs() -> u64 {
    300
}

fn default_history_capacity() -> usize {
    tagcache::DEFAULT_HISTORY_CAPACITY
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: default_snapshot_interval_secs(),
            history_capacity: default_history_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_admin_requests_per_window")]
    pub admin_requests_per_window: u64,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_admin_requests_per_window() -> u64 {
    60
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            admin_requests_per_window: default_admin_requests_per_window(),
            window_secs: default_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_PATH: &str = "tagcache.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., TAGCACHE__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("TAGCACHE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.addr().port(), 8080);
        assert_eq!(cfg.snapshot_interval(), Duration::from_secs(300));
        assert_eq!(cfg.stats.history_capacity, 24);
        assert!(!cfg.redis.enabled);
    }

    #[test]
    fn test_validation_rejects_zeroes() {
        let mut cfg = AppConfig::default();
        cfg.cache.default_ttl_secs = 0;
        assert!(cfg.validate().unwrap_err().contains("default_ttl_secs"));

        let mut cfg = AppConfig::default();
        cfg.stats.history_capacity = 0;
        assert!(cfg.validate().unwrap_err().contains("history_capacity"));

        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn test_cache_options_follow_config() {
        let mut cache = CacheConfig::default();
        assert!(!cache.options(["a"]).stale_while_revalidate);
        cache.stale_while_revalidate = true;
        let options = cache.options(["forum"]);
        assert!(options.stale_while_revalidate);
        assert!(options.tags.contains("forum"));
    }

    #[test]
    fn test_redis_store_config_mapping() {
        let redis = RedisConfig {
            enabled: true,
            url: "redis://cache:6380".into(),
            pool_size: 4,
            timeout_ms: 250,
        };
        let store = redis.store_config();
        assert_eq!(store.url, "redis://cache:6380");
        assert_eq!(store.pool_size, 4);
        assert_eq!(store.timeout_ms, 250);
    }
}
