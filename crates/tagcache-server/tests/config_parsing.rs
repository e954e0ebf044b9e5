use std::{env, fs};

use tagcache_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("tagcache.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081

[redis]
enabled = true
url = "redis://cache.internal:6379"
pool_size = 4

[cache]
key_prefix = "app:"
default_ttl_secs = 120
stale_while_revalidate = true

[stats]
snapshot_interval_secs = 60
history_capacity = 48

[rate_limit]
admin_requests_per_window = 10
window_secs = 30

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses; unspecified fields keep their defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert!(cfg.redis.enabled);
    assert_eq!(cfg.redis.pool_size, 4);
    assert_eq!(cfg.redis.timeout_ms, 5000);
    assert_eq!(cfg.cache.key_prefix, "app:");
    assert_eq!(cfg.cache.default_ttl_secs, 120);
    assert!(cfg.cache.stale_while_revalidate);
    assert_eq!(cfg.stats.history_capacity, 48);
    assert!(cfg.rate_limit.enabled);
    assert_eq!(cfg.rate_limit.admin_requests_per_window, 10);
    assert_eq!(cfg.logging.level.to_ascii_lowercase(), "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("TAGCACHE__CACHE__DEFAULT_TTL_SECS", "900");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.cache.default_ttl_secs, 900);
    unsafe {
        env::remove_var("TAGCACHE__CACHE__DEFAULT_TTL_SECS");
    }

    // 3) Invalid config should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[stats]
history_capacity = 0
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("history_capacity must be > 0"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(path.to_str()).expect("defaults are valid");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.cache.key_prefix, "cache:");
    assert_eq!(cfg.stats.snapshot_interval_secs, 300);
    assert!(!cfg.redis.enabled);
}
