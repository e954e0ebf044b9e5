//! Hit/miss accounting with periodic snapshots to the backing store.
//!
//! Counting is purely in-process (two atomics per event). A scheduler outside
//! the core calls [`StatsRecorder::snapshot_to_store`] on a fixed cadence,
//! which flushes the unflushed deltas into store counters and appends a
//! [`HistoryPoint`] to a bounded list, most recent first.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tagcache_store::{DynStore, StoreError};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::error::{CacheError, CacheResult};
use crate::telemetry;

/// Default number of history points kept (2 hours at a 5 minute cadence).
pub const DEFAULT_HISTORY_CAPACITY: usize = 24;

/// Stats recorder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsConfig {
    /// Prefix of the counter and history keys.
    pub key_prefix: String,
    /// Maximum number of history points kept in the store.
    pub history_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            key_prefix: "stats:cache:".to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl StatsConfig {
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

/// In-process counters since start or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCounters {
    pub hits: u64,
    pub misses: u64,
}

/// Store-persisted counters plus anything not yet flushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackingCounters {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub total: u64,
}

impl BackingCounters {
    fn new(hits: u64, misses: u64) -> Self {
        Self {
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
            total: hits + misses,
        }
    }
}

/// One entry of the snapshot time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    pub hit_rate: f64,
}

/// Everything the cache-stats endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub local: LocalCounters,
    pub backing: BackingCounters,
    pub historical: Vec<HistoryPoint>,
}

/// Hit rate as a percentage rounded to two decimals; 0 when nothing was counted.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    let percent = hits as f64 / total as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

/// Process-wide hit/miss recorder.
///
/// Construct one at startup and share it by `Arc` with every cache.
pub struct StatsRecorder {
    store: DynStore,
    hits_key: String,
    misses_key: String,
    history_key: String,
    history_capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Counted but not yet flushed to the store.
    pending_hits: AtomicU64,
    pending_misses: AtomicU64,
    /// Held by flush and reset so a reset cannot land between a flush's
    /// swap and its increments.
    store_sync: Mutex<()>,
}

impl std::fmt::Debug for StatsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRecorder")
            .field("backend", &self.store.backend_name())
            .field("local", &self.local())
            .field("history_capacity", &self.history_capacity)
            .finish()
    }
}

impl StatsRecorder {
    pub fn new(store: DynStore) -> Self {
        Self::with_config(store, StatsConfig::default())
    }

    pub fn with_config(store: DynStore, config: StatsConfig) -> Self {
        Self {
            store,
            hits_key: format!("{}hits", config.key_prefix),
            misses_key: format!("{}misses", config.key_prefix),
            history_key: format!("{}history", config.key_prefix),
            history_capacity: config.history_capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            pending_hits: AtomicU64::new(0),
            pending_misses: AtomicU64::new(0),
            store_sync: Mutex::new(()),
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.pending_hits.fetch_add(1, Ordering::Relaxed);
        telemetry::record_hit();
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.pending_misses.fetch_add(1, Ordering::Relaxed);
        telemetry::record_miss();
    }

    pub fn local(&self) -> LocalCounters {
        LocalCounters {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Flushes pending counts, then appends a history point built from the
    /// store totals and trims the history to its capacity.
    pub async fn snapshot_to_store(&self) -> CacheResult<HistoryPoint> {
        let (hits, misses) = self.flush().await?;
        let point = HistoryPoint {
            timestamp: OffsetDateTime::now_utc(),
            hits,
            misses,
            total: hits + misses,
            hit_rate: hit_rate(hits, misses),
        };

        let encoded = serde_json::to_string(&point)
            .map_err(|e| CacheError::serialization(self.history_key.as_str(), e))?;
        self.store
            .list_push_front(&self.history_key, &encoded)
            .await?;
        self.store
            .list_trim(&self.history_key, 0, self.history_capacity as i64 - 1)
            .await?;

        tracing::debug!(
            hits,
            misses,
            hit_rate = point.hit_rate,
            "cache stats snapshot stored"
        );
        Ok(point)
    }

    /// Moves pending deltas into the store counters, returning the new totals.
    ///
    /// Deltas that could not be written are put back for the next attempt.
    async fn flush(&self) -> CacheResult<(u64, u64)> {
        let _sync = self.store_sync.lock().await;
        let hits_delta = self.pending_hits.swap(0, Ordering::AcqRel);
        let misses_delta = self.pending_misses.swap(0, Ordering::AcqRel);

        let hits = match self.store.increment(&self.hits_key, hits_delta as i64).await {
            Ok(total) => total,
            Err(e) => {
                self.pending_hits.fetch_add(hits_delta, Ordering::AcqRel);
                self.pending_misses.fetch_add(misses_delta, Ordering::AcqRel);
                return Err(e.into());
            }
        };
        let misses = match self
            .store
            .increment(&self.misses_key, misses_delta as i64)
            .await
        {
            Ok(total) => total,
            Err(e) => {
                self.pending_misses.fetch_add(misses_delta, Ordering::AcqRel);
                return Err(e.into());
            }
        };
        Ok((hits.max(0) as u64, misses.max(0) as u64))
    }

    /// Store totals including counts not flushed yet.
    pub async fn backing(&self) -> CacheResult<BackingCounters> {
        let hits = self.read_counter(&self.hits_key).await?
            + self.pending_hits.load(Ordering::Relaxed);
        let misses = self.read_counter(&self.misses_key).await?
            + self.pending_misses.load(Ordering::Relaxed);
        Ok(BackingCounters::new(hits, misses))
    }

    async fn read_counter(&self, key: &str) -> CacheResult<u64> {
        match self.store.get(key).await? {
            None => Ok(0),
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| StoreError::wrong_type(key, "counter").into()),
        }
    }

    /// History points, most recent first.
    pub async fn history(&self) -> CacheResult<Vec<HistoryPoint>> {
        let raw = self
            .store
            .list_range(&self.history_key, 0, self.history_capacity as i64 - 1)
            .await?;
        Ok(raw
            .iter()
            .filter_map(|item| match serde_json::from_str::<HistoryPoint>(item) {
                Ok(point) => Some(point),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable stats history point");
                    None
                }
            })
            .collect())
    }

    pub async fn report(&self) -> CacheResult<StatsReport> {
        Ok(StatsReport {
            local: self.local(),
            backing: self.backing().await?,
            historical: self.history().await?,
        })
    }

    /// Zeroes the store counters and then the in-process counters.
    ///
    /// The store is cleared in a single delete; if that fails nothing is
    /// changed and the error is returned, so both sides always agree.
    pub async fn reset(&self) -> CacheResult<()> {
        let _sync = self.store_sync.lock().await;
        self.store
            .delete(&[self.hits_key.clone(), self.misses_key.clone()])
            .await?;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.pending_hits.store(0, Ordering::Relaxed);
        self.pending_misses.store(0, Ordering::Relaxed);
        tracing::info!("cache stats reset");
        Ok(())
    }
}
