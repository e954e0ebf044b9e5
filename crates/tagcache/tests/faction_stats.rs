//! End-to-end: faction statistics cached under a tag, then invalidated.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tagcache::{BoxError, CacheOptions, StatsRecorder, TagCache};
use tagcache_store_memory::create_memory_store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FactionStats {
    dominion: u64,
    reformation: u64,
    neutral: u64,
    total: u64,
    dominion_percentage: f64,
    reformation_percentage: f64,
    neutral_percentage: f64,
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((part as f64 / total as f64) * 10_000.0).round() / 100.0
}

/// Stand-in for the relational member counts.
#[derive(Default)]
struct MemberTable {
    counts: Mutex<(u64, u64, u64)>,
    queries: AtomicUsize,
}

impl MemberTable {
    fn with_counts(dominion: u64, reformation: u64, neutral: u64) -> Arc<Self> {
        let table = Self::default();
        *table.counts.lock().unwrap() = (dominion, reformation, neutral);
        Arc::new(table)
    }

    fn faction_stats(&self) -> FactionStats {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let (dominion, reformation, neutral) = *self.counts.lock().unwrap();
        let total = dominion + reformation + neutral;
        FactionStats {
            dominion,
            reformation,
            neutral,
            total,
            dominion_percentage: percentage(dominion, total),
            reformation_percentage: percentage(reformation, total),
            neutral_percentage: percentage(neutral, total),
        }
    }
}

fn cache() -> TagCache {
    let store = create_memory_store();
    let stats = Arc::new(StatsRecorder::new(store.clone()));
    TagCache::new(store, stats)
}

async fn cached_faction_stats(cache: &TagCache, table: &Arc<MemberTable>) -> FactionStats {
    let table = Arc::clone(table);
    cache
        .get_or_compute(
            "faction:stats",
            move || async move { Ok::<_, BoxError>(table.faction_stats()) },
            300,
            &CacheOptions::new().with_tag("faction-stats"),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn second_call_is_served_from_cache() {
    let cache = cache();
    let table = MemberTable::with_counts(10, 5, 2);

    let first = cached_faction_stats(&cache, &table).await;
    assert_eq!(first.total, 17);
    assert_eq!(first.dominion_percentage, 58.82);
    assert_eq!(first.reformation_percentage, 29.41);
    assert_eq!(first.neutral_percentage, 11.76);

    // New members join, but the cached figures are still fresh.
    *table.counts.lock().unwrap() = (11, 5, 2);
    let second = cached_faction_stats(&cache, &table).await;

    assert_eq!(second, first);
    assert_eq!(table.queries.load(Ordering::SeqCst), 1);

    let local = cache.stats().local();
    assert_eq!((local.hits, local.misses), (1, 1));
}

#[tokio::test]
async fn tag_invalidation_forces_recompute() {
    let cache = cache();
    let table = MemberTable::with_counts(10, 5, 2);
    cached_faction_stats(&cache, &table).await;

    *table.counts.lock().unwrap() = (11, 5, 2);
    assert_eq!(cache.invalidate_tag("faction-stats").await.unwrap(), 1);

    let fresh = cached_faction_stats(&cache, &table).await;
    assert_eq!(fresh.dominion, 11);
    assert_eq!(fresh.total, 18);
    assert_eq!(table.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn snapshot_reflects_the_scenario() {
    let cache = cache();
    let table = MemberTable::with_counts(10, 5, 2);
    cached_faction_stats(&cache, &table).await;
    cached_faction_stats(&cache, &table).await;
    cached_faction_stats(&cache, &table).await;

    let point = cache.stats().snapshot_to_store().await.unwrap();
    assert_eq!((point.hits, point.misses, point.total), (2, 1, 3));
    assert_eq!(point.hit_rate, 66.67);

    let report = cache.stats().report().await.unwrap();
    assert_eq!(report.historical.len(), 1);
    assert_eq!(report.backing.total, 3);
}
