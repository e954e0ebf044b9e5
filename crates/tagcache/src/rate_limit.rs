//! Fixed-window rate limiting on store counters.
//!
//! Each `(action, identity)` pair owns one counter key that expires after the
//! window. A burst straddling a window boundary can admit up to twice the
//! limit.

use serde::Serialize;
use tagcache_store::DynStore;

use crate::entry::validate_ttl;
use crate::error::CacheResult;
use crate::telemetry;

/// Outcome of a single [`RateLimiter::allow`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests counted in the current window, this one included.
    pub count: u64,
    pub limit: u64,
    pub remaining: u64,
    pub window_secs: u64,
}

/// Fixed-window limiter keyed by identity and action.
#[derive(Clone)]
pub struct RateLimiter {
    store: DynStore,
    prefix: String,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.store.backend_name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl RateLimiter {
    pub const DEFAULT_PREFIX: &'static str = "ratelimit:";

    pub fn new(store: DynStore) -> Self {
        Self {
            store,
            prefix: Self::DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn counter_key(&self, identity: &str, action: &str) -> String {
        format!("{}{}:{}", self.prefix, action, identity)
    }

    /// Counts one request for `identity` performing `action`.
    pub async fn allow(
        &self,
        identity: &str,
        action: &str,
        limit: u64,
        window_secs: u64,
    ) -> CacheResult<RateDecision> {
        validate_ttl(window_secs)?;
        let key = self.counter_key(identity, action);
        let count = self.store.increment(&key, 1).await?.max(0) as u64;

        if count == 1 {
            self.store.expire(&key, window_secs).await?;
        } else if self.store.ttl(&key).await? == Some(-1) {
            // The first request's expire never landed; without this the
            // window would never close.
            tracing::warn!(key = %key, "rate limit counter without expiry, re-arming");
            self.store.expire(&key, window_secs).await?;
        }

        let allowed = count <= limit;
        if !allowed {
            telemetry::record_rate_limit_rejection(action);
            tracing::debug!(identity = %identity, action = %action, count, limit, "rate limited");
        }
        Ok(RateDecision {
            allowed,
            count,
            limit,
            remaining: limit.saturating_sub(count),
            window_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tagcache_store::BackingStore;
    use tagcache_store_memory::InMemoryStore;

    fn limiter() -> (Arc<InMemoryStore>, RateLimiter) {
        let store = Arc::new(InMemoryStore::new());
        (store.clone(), RateLimiter::new(store))
    }

    #[tokio::test]
    async fn test_fourth_call_is_rejected_until_window_passes() {
        let (_store, limiter) = limiter();
        for expected in 1..=3u64 {
            let decision = limiter.allow("10.0.0.1", "vote", 3, 1).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.count, expected);
            assert_eq!(decision.remaining, 3 - expected);
        }
        let decision = limiter.allow("10.0.0.1", "vote", 3, 1).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let decision = limiter.allow("10.0.0.1", "vote", 3, 1).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
    }

    #[tokio::test]
    async fn test_identities_and_actions_are_independent() {
        let (store, limiter) = limiter();
        assert!(limiter.allow("alice", "post", 1, 60).await.unwrap().allowed);
        assert!(!limiter.allow("alice", "post", 1, 60).await.unwrap().allowed);
        assert!(limiter.allow("bob", "post", 1, 60).await.unwrap().allowed);
        assert!(limiter.allow("alice", "vote", 1, 60).await.unwrap().allowed);

        assert_eq!(
            store.get("ratelimit:post:alice").await.unwrap().as_deref(),
            Some("2")
        );
        let ttl = store.ttl("ratelimit:post:alice").await.unwrap().unwrap();
        assert!(ttl > 0 && ttl <= 60);
    }

    #[tokio::test]
    async fn test_missing_expiry_is_rearmed() {
        let (store, limiter) = limiter();
        store.increment("ratelimit:post:carol", 1).await.unwrap();
        assert_eq!(store.ttl("ratelimit:post:carol").await.unwrap(), Some(-1));

        let decision = limiter.allow("carol", "post", 5, 30).await.unwrap();
        assert_eq!(decision.count, 2);
        let ttl = store.ttl("ratelimit:post:carol").await.unwrap().unwrap();
        assert!(ttl > 0 && ttl <= 30);
    }

    #[tokio::test]
    async fn test_zero_window_is_rejected() {
        let (_store, limiter) = limiter();
        let err = limiter.allow("x", "y", 1, 0).await.unwrap_err();
        assert!(err.is_invalid_input());
    }
}
