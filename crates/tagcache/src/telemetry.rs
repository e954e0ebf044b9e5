//! Prometheus-style counters emitted through the `metrics` facade.
//!
//! Nothing is recorded unless the host process installs a recorder.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "tagcache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "tagcache_misses_total";
    pub const CACHE_REFRESHES_TOTAL: &str = "tagcache_refreshes_total";
    pub const CACHE_REFRESH_FAILURES_TOTAL: &str = "tagcache_refresh_failures_total";
    pub const CACHE_INVALIDATIONS_TOTAL: &str = "tagcache_invalidations_total";
    pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "tagcache_rate_limit_rejections_total";
}

pub(crate) fn record_hit() {
    counter!(names::CACHE_HITS_TOTAL).increment(1);
}

pub(crate) fn record_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

pub(crate) fn record_refresh(ok: bool) {
    if ok {
        counter!(names::CACHE_REFRESHES_TOTAL).increment(1);
    } else {
        counter!(names::CACHE_REFRESH_FAILURES_TOTAL).increment(1);
    }
}

/// `kind` is one of `key`, `tag`, `pattern`.
pub(crate) fn record_invalidations(kind: &'static str, count: u64) {
    counter!(names::CACHE_INVALIDATIONS_TOTAL, "kind" => kind).increment(count);
}

pub(crate) fn record_rate_limit_rejection(action: &str) {
    counter!(names::RATE_LIMIT_REJECTIONS_TOTAL, "action" => action.to_string()).increment(1);
}
