//! Prometheus exporter for the cache counters.
//!
//! The core crate records through the `metrics` facade; this module installs
//! the recorder and renders the scrape output for `/metrics`.

use metrics::{Unit, counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tagcache::metric_names as names;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const ADMIN_REQUESTS_TOTAL: &str = "tagcache_admin_requests_total";

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics is served by the admin router.
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            describe_metrics();
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

fn describe_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, Unit::Count, "Cache lookups served from the store");
    describe_counter!(names::CACHE_MISSES_TOTAL, Unit::Count, "Cache lookups that ran the compute function");
    describe_counter!(names::CACHE_REFRESHES_TOTAL, Unit::Count, "Successful background refreshes");
    describe_counter!(
        names::CACHE_REFRESH_FAILURES_TOTAL,
        Unit::Count,
        "Background refreshes that failed and kept the stale value"
    );
    describe_counter!(names::CACHE_INVALIDATIONS_TOTAL, Unit::Count, "Invalidated keys by kind");
    describe_counter!(names::RATE_LIMIT_REJECTIONS_TOTAL, Unit::Count, "Requests rejected by the rate limiter");
    describe_counter!(ADMIN_REQUESTS_TOTAL, Unit::Count, "Admin API requests by route and status class");
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record an admin API request.
pub fn record_admin_request(route: &str, status: u16) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };
    counter!(
        ADMIN_REQUESTS_TOTAL,
        "route" => route.to_string(),
        "status_class" => status_class
    )
    .increment(1);
}
