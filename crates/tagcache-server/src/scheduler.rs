//! Periodic stats snapshots.
//!
//! Flushes the in-process hit/miss counters to the backing store and appends
//! a history point every `interval`. A final snapshot runs on shutdown so
//! counts since the last tick are not lost.

use std::sync::Arc;
use std::time::Duration;

use tagcache::StatsRecorder;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Background task that snapshots cache stats on a fixed cadence.
pub struct SnapshotScheduler {
    stats: Arc<StatsRecorder>,
    interval: Duration,
}

/// Handle to a running [`SnapshotScheduler`].
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SnapshotScheduler {
    pub fn new(stats: Arc<StatsRecorder>, interval: Duration) -> Self {
        Self { stats, interval }
    }

    /// Start the scheduler in a background task.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                "Stats snapshot scheduler started"
            );

            // First tick one full interval from now, not immediately.
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.snapshot().await,
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Stats snapshot scheduler shutting down");
                            self.snapshot().await;
                            break;
                        }
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn snapshot(&self) {
        match self.stats.snapshot_to_store().await {
            Ok(point) => debug!(
                hits = point.hits,
                misses = point.misses,
                hit_rate = point.hit_rate,
                "Stats snapshot taken"
            ),
            // Deltas are kept by the recorder and retried on the next tick.
            Err(e) => warn!(error = %e, "Stats snapshot failed"),
        }
    }
}

impl SchedulerHandle {
    /// Signals shutdown and waits for the final snapshot.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Stats snapshot scheduler task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagcache_store_memory::create_memory_store;

    #[tokio::test]
    async fn test_snapshots_on_interval_and_on_stop() {
        let stats = Arc::new(StatsRecorder::new(create_memory_store()));
        stats.record_hit();

        let handle = SnapshotScheduler::new(stats.clone(), Duration::from_millis(50)).start();
        tokio::time::sleep(Duration::from_millis(180)).await;
        let ticks = stats.history().await.unwrap().len();
        assert!(ticks >= 2, "expected periodic snapshots, got {ticks}");

        stats.record_miss();
        handle.stop().await;
        let history = stats.history().await.unwrap();
        assert!(history.len() > ticks);
        assert_eq!((history[0].hits, history[0].misses), (1, 1));
    }

    #[tokio::test]
    async fn test_no_snapshot_before_first_interval() {
        let stats = Arc::new(StatsRecorder::new(create_memory_store()));
        let handle = SnapshotScheduler::new(stats.clone(), Duration::from_secs(3600)).start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(stats.history().await.unwrap().is_empty());
        handle.stop().await;
        assert_eq!(stats.history().await.unwrap().len(), 1);
    }
}
