//! Log setup. The level starts at `info` and is swapped for the configured
//! one once the config file has been read.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Crates whose logs follow the configured level.
const OWN_TARGETS: &[&str] = &[
    "tagcache",
    "tagcache_server",
    "tagcache_store_memory",
    "tagcache_store_redis",
];

/// Dependencies that only log at `warn` and above unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["hyper", "tower_http", "deadpool", "redis"];

/// Builds the filter for `level`: our crates at `level`, chatty dependencies
/// at `warn`, everything else at `level` too.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    if level == "off" {
        return level;
    }
    let mut directives = vec![level.clone()];
    directives.extend(OWN_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    directives.join(",")
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(filter_directives(level)).unwrap_or_else(|e| {
        eprintln!("invalid log level {level:?} ({e}), using info");
        EnvFilter::new(filter_directives("info"))
    })
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    let filter = match std::env::var_os("RUST_LOG") {
        Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| build_filter(level)),
        None => build_filter(level),
    };

    let (filter_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches to the configured level. No-op when `RUST_LOG` is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    if let Err(e) = handle.reload(build_filter(level)) {
        tracing::warn!(error = %e, "failed to apply log level");
        return;
    }
    tracing::debug!(level = %level, "log level applied");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_scope_level_to_own_crates() {
        let directives = filter_directives(" DEBUG ");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("tagcache=debug"));
        assert!(directives.contains("tagcache_store_redis=debug"));
        assert!(directives.contains("tower_http=warn"));
    }

    #[test]
    fn test_off_silences_everything() {
        assert_eq!(filter_directives("off"), "off");
    }

    #[test]
    fn test_directives_parse() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(EnvFilter::try_new(filter_directives(level)).is_ok(), "{level}");
        }
    }
}
