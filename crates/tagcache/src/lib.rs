//! # tagcache
//!
//! Tag-aware caching layer over a key-value [`BackingStore`](tagcache_store::BackingStore).
//!
//! - [`TagCache`]: get-or-compute with stale-while-revalidate, tag indexes
//!   and invalidation by key, tag or key prefix.
//! - [`StatsRecorder`]: process-wide hit/miss counters with snapshots to a
//!   bounded history in the store.
//! - [`RateLimiter`]: fixed-window counters keyed by identity and action.
//! - [`content_key`]: stable content-addressed keys.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tagcache::{CacheOptions, StatsRecorder, TagCache};
//! use tagcache_store_memory::create_memory_store;
//!
//! let store = create_memory_store();
//! let stats = Arc::new(StatsRecorder::new(store.clone()));
//! let cache = TagCache::new(store, stats);
//!
//! let threads: Vec<String> = cache
//!     .get_or_compute("forum:threads", load_threads, 300, &CacheOptions::swr(["forum"]))
//!     .await?;
//! cache.invalidate_tag("forum").await?;
//! ```

mod cache;
mod entry;
mod error;
mod keys;
mod options;
mod rate_limit;
mod single_flight;
mod stats;
mod telemetry;

pub use cache::TagCache;
pub use entry::{EntryMeta, KeySpace, MAX_TTL_SECS, now_millis};
pub use error::{BoxError, CacheError, CacheResult, KeyFailure};
pub use keys::{content_key, fnv1a_64};
pub use options::CacheOptions;
pub use rate_limit::{RateDecision, RateLimiter};
pub use stats::{
    BackingCounters, DEFAULT_HISTORY_CAPACITY, HistoryPoint, LocalCounters, StatsConfig,
    StatsRecorder, StatsReport, hit_rate,
};
pub use telemetry::names as metric_names;
