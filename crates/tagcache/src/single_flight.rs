//! Per-key in-flight guards.
//!
//! Concurrent misses on the same key queue on one async mutex so only the
//! first caller computes; the others re-read the store once it is released.
//! A map entry lives only while someone holds or waits on it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = Arc<DashMap<String, Arc<Mutex<()>>>>;
type Acquire = Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>;

/// Map of per-key async mutexes.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyLocks {
    locks: LockMap,
}

impl KeyLocks {
    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Waits for exclusive ownership of `key`.
    pub(crate) async fn lock(&self, key: &str) -> KeyGuard {
        LockWait {
            locks: Arc::clone(&self.locks),
            key: key.to_string(),
            acquire: Some(Box::pin(self.handle(key).lock_owned())),
        }
        .await
    }

    /// Takes ownership of `key` only if nobody else holds it.
    pub(crate) fn try_lock(&self, key: &str) -> Option<KeyGuard> {
        let guard = self.handle(key).try_lock_owned().ok();
        match guard {
            Some(guard) => Some(KeyGuard {
                locks: Arc::clone(&self.locks),
                key: key.to_string(),
                guard: Some(guard),
            }),
            None => {
                self.release_if_idle(key);
                None
            }
        }
    }

    fn release_if_idle(&self, key: &str) {
        release_if_idle(&self.locks, key);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

// Runs under the shard write lock, so no new handle can be cloned meanwhile.
fn release_if_idle(locks: &LockMap, key: &str) {
    locks.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
}

/// Pending [`KeyLocks::lock`]. Dropping it before it resolves still prunes
/// the map entry.
struct LockWait {
    locks: LockMap,
    key: String,
    acquire: Option<Acquire>,
}

impl Future for LockWait {
    type Output = KeyGuard;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<KeyGuard> {
        let Some(acquire) = self.acquire.as_mut() else {
            return Poll::Pending;
        };
        match acquire.as_mut().poll(cx) {
            Poll::Ready(guard) => {
                self.acquire = None;
                Poll::Ready(KeyGuard {
                    locks: Arc::clone(&self.locks),
                    key: self.key.clone(),
                    guard: Some(guard),
                })
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for LockWait {
    fn drop(&mut self) {
        // The acquire future owns an Arc to the mutex; drop it before the count check.
        if let Some(acquire) = self.acquire.take() {
            drop(acquire);
            release_if_idle(&self.locks, &self.key);
        }
    }
}

/// Exclusive ownership of one key; released on drop.
pub(crate) struct KeyGuard {
    locks: LockMap,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // The owned guard keeps an Arc to the mutex; drop it before the count check.
        self.guard.take();
        release_if_idle(&self.locks, &self.key);
    }
}
