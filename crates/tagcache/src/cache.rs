//! Get-or-compute engine with stale-while-revalidate and tag invalidation.
//!
//! All state lives in the backing store except the hit/miss counters (owned
//! by [`StatsRecorder`]) and the per-key in-flight guards. A [`TagCache`] is
//! cheap to clone; clones share the store, the recorder and the guards.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tagcache_store::DynStore;

use crate::entry::{EntryMeta, KeySpace, now_millis, validate_ttl};
use crate::error::{BoxError, CacheError, CacheResult, KeyFailure};
use crate::options::CacheOptions;
use crate::single_flight::{KeyGuard, KeyLocks};
use crate::stats::StatsRecorder;
use crate::telemetry;

/// Maximum number of keys per bulk delete during pattern invalidation.
const DELETE_CHUNK_SIZE: usize = 500;

/// Tag-aware cache over a [`BackingStore`](tagcache_store::BackingStore).
#[derive(Clone)]
pub struct TagCache {
    store: DynStore,
    stats: Arc<StatsRecorder>,
    keys: KeySpace,
    locks: KeyLocks,
}

impl std::fmt::Debug for TagCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagCache")
            .field("backend", &self.store.backend_name())
            .field("prefix", &self.keys.prefix())
            .finish()
    }
}

impl TagCache {
    pub fn new(store: DynStore, stats: Arc<StatsRecorder>) -> Self {
        Self {
            store,
            stats,
            keys: KeySpace::default(),
            locks: KeyLocks::default(),
        }
    }

    /// Uses a different physical key prefix than `cache:`.
    pub fn with_key_space(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    pub fn stats(&self) -> &Arc<StatsRecorder> {
        &self.stats
    }

    pub fn store(&self) -> &DynStore {
        &self.store
    }

    pub fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// On a hit past half its TTL with stale-while-revalidate enabled, the
    /// cached value is returned and `compute` runs in a detached task. Each
    /// call counts exactly one hit or one miss.
    pub async fn get_or_compute<T, F, Fut, E>(
        &self,
        key: &str,
        compute: F,
        ttl_secs: u64,
        options: &CacheOptions,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        self.keys.validate_key(key)?;
        validate_ttl(ttl_secs)?;
        for tag in &options.tags {
            self.keys.validate_tag(tag)?;
        }

        if let Some((value, meta)) = self.read_entry::<T>(key).await? {
            self.stats.record_hit();
            tracing::debug!(key = %key, "cache hit");
            if options.stale_while_revalidate && meta.is_stale(ttl_secs, now_millis()) {
                match self.locks.try_lock(key) {
                    Some(guard) => {
                        self.spawn_refresh(key, guard, compute, ttl_secs, options.tags.clone())
                    }
                    None => tracing::debug!(key = %key, "refresh already in flight"),
                }
            }
            return Ok(value);
        }

        let _guard = self.locks.lock(key).await;

        // Another caller may have filled the entry while we waited.
        if let Some((value, _)) = self.read_entry::<T>(key).await? {
            self.stats.record_hit();
            tracing::debug!(key = %key, "cache hit after wait");
            return Ok(value);
        }

        self.stats.record_miss();
        tracing::debug!(key = %key, "cache miss");
        let value = compute()
            .await
            .map_err(|e| CacheError::compute(key, e))?;
        self.write_entry(key, &value, ttl_secs, &options.tags)
            .await?;
        Ok(value)
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but logs any error and
    /// returns `T::default()` instead.
    pub async fn get_or_default<T, F, Fut, E>(
        &self,
        key: &str,
        compute: F,
        ttl_secs: u64,
        options: &CacheOptions,
    ) -> T
    where
        T: Default + Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        match self.get_or_compute(key, compute, ttl_secs, options).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, using default");
                T::default()
            }
        }
    }

    /// Reads a cached value without computing and without counting.
    pub async fn peek<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        Ok(self.peek_entry(key).await?.map(|(value, _)| value))
    }

    /// Like [`peek`](Self::peek), but also returns the entry metadata.
    pub async fn peek_entry<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> CacheResult<Option<(T, EntryMeta)>> {
        self.keys.validate_key(key)?;
        self.read_entry(key).await
    }

    /// Writes `value` through to the store, replacing any cached entry.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
        tags: &BTreeSet<String>,
    ) -> CacheResult<()> {
        self.keys.validate_key(key)?;
        validate_ttl(ttl_secs)?;
        for tag in tags {
            self.keys.validate_tag(tag)?;
        }
        self.write_entry(key, value, ttl_secs, tags).await
    }

    /// Removes the entry for `key` and its tag index memberships.
    ///
    /// Invalidating a key that is not cached is a no-op.
    pub async fn invalidate_key(&self, key: &str) -> CacheResult<()> {
        self.keys.validate_key(key)?;
        let removed = self.remove_entry(key).await?;
        if removed > 0 {
            telemetry::record_invalidations("key", 1);
        }
        tracing::debug!(key = %key, removed, "cache key invalidated");
        Ok(())
    }

    /// Invalidates every key indexed under `tag`, then drops the index.
    ///
    /// Returns the number of member keys processed. Failed members are
    /// reported as [`CacheError::PartialInvalidation`] and the index is kept
    /// so a retry can finish the job.
    pub async fn invalidate_tag(&self, tag: &str) -> CacheResult<u64> {
        self.keys.validate_tag(tag)?;
        let tag_key = self.keys.tag_key(tag);
        let members = self.store.set_members(&tag_key).await?;

        let mut succeeded = 0u64;
        let mut failed = Vec::new();
        for member in &members {
            match self.remove_entry(member).await {
                Ok(_) => succeeded += 1,
                Err(e) => {
                    tracing::warn!(tag = %tag, key = %member, error = %e, "failed to invalidate tagged key");
                    failed.push(KeyFailure::new(member.as_str(), e));
                }
            }
        }
        telemetry::record_invalidations("tag", succeeded);

        if !failed.is_empty() {
            return Err(CacheError::PartialInvalidation { succeeded, failed });
        }

        self.store.delete(&[tag_key]).await?;
        tracing::info!(tag = %tag, invalidated = succeeded, "cache tag invalidated");
        Ok(succeeded)
    }

    /// Deletes every entry whose key starts with `key_prefix`, along with tag
    /// indexes whose tag starts with it. Returns the number of store keys
    /// deleted.
    pub async fn invalidate_pattern(&self, key_prefix: &str) -> CacheResult<u64> {
        // `cache:t*` also matches `cache:tag:*`; tag indexes only come from
        // the tags scan so unrelated tags keep their members.
        let tag_namespace = self.keys.tag_key("");
        let mut targets = BTreeSet::new();
        targets.extend(
            self.store
                .keys_matching(&self.keys.entries_pattern(key_prefix))
                .await?
                .into_iter()
                .filter(|key| !key.starts_with(&tag_namespace)),
        );
        targets.extend(
            self.store
                .keys_matching(&self.keys.tags_pattern(key_prefix))
                .await?,
        );
        let targets: Vec<String> = targets.into_iter().collect();

        let mut deleted = 0u64;
        let mut failed = Vec::new();
        for chunk in targets.chunks(DELETE_CHUNK_SIZE) {
            match self.store.delete(chunk).await {
                Ok(count) => deleted += count,
                Err(e) => {
                    tracing::warn!(keys = chunk.len(), error = %e, "bulk cache delete failed");
                    failed.extend(chunk.iter().map(|key| KeyFailure::new(key.as_str(), &e)));
                }
            }
        }
        telemetry::record_invalidations("pattern", deleted);

        if !failed.is_empty() {
            return Err(CacheError::PartialInvalidation {
                succeeded: deleted,
                failed,
            });
        }
        tracing::info!(prefix = %key_prefix, deleted, "cache pattern invalidated");
        Ok(deleted)
    }

    /// Deletes every cache entry and tag index.
    pub async fn invalidate_all(&self) -> CacheResult<u64> {
        self.invalidate_pattern("").await
    }

    /// Reads value and metadata; anything short of both decoding is a miss.
    async fn read_entry<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> CacheResult<Option<(T, EntryMeta)>> {
        let Some(raw_value) = self.store.get(&self.keys.value_key(key)).await? else {
            return Ok(None);
        };
        let Some(raw_meta) = self.store.get(&self.keys.meta_key(key)).await? else {
            return Ok(None);
        };

        let meta = match serde_json::from_str::<EntryMeta>(&raw_meta) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "unreadable cache metadata, treating as miss");
                return Ok(None);
            }
        };
        match serde_json::from_str::<T>(&raw_value) {
            Ok(value) => Ok(Some((value, meta))),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "unreadable cached value, treating as miss");
                Ok(None)
            }
        }
    }

    async fn write_entry<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
        tags: &BTreeSet<String>,
    ) -> CacheResult<()> {
        let encoded = serde_json::to_string(value).map_err(|e| CacheError::serialization(key, e))?;
        let meta = serde_json::to_string(&EntryMeta::new(tags.clone()))
            .map_err(|e| CacheError::serialization(key, e))?;

        self.store
            .set(&self.keys.value_key(key), &encoded, ttl_secs)
            .await?;
        self.store
            .set(&self.keys.meta_key(key), &meta, ttl_secs)
            .await?;
        for tag in tags {
            self.store.set_add(&self.keys.tag_key(tag), key).await?;
        }
        tracing::debug!(key = %key, ttl_secs, tags = tags.len(), "cache set");
        Ok(())
    }

    /// Deletes value and metadata, then prunes the key from its tag indexes.
    async fn remove_entry(&self, key: &str) -> CacheResult<u64> {
        let tags = match self.store.get(&self.keys.meta_key(key)).await? {
            Some(raw) => match serde_json::from_str::<EntryMeta>(&raw) {
                Ok(meta) => meta.tags,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "unreadable cache metadata on invalidation");
                    BTreeSet::new()
                }
            },
            None => BTreeSet::new(),
        };

        let removed = self
            .store
            .delete(&[self.keys.value_key(key), self.keys.meta_key(key)])
            .await?;
        for tag in &tags {
            self.store.set_remove(&self.keys.tag_key(tag), key).await?;
        }
        Ok(removed)
    }

    fn spawn_refresh<T, F, Fut, E>(
        &self,
        key: &str,
        guard: KeyGuard,
        compute: F,
        ttl_secs: u64,
        tags: BTreeSet<String>,
    ) where
        T: Serialize + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let cache = self.clone();
        let key = key.to_string();
        tracing::debug!(key = %key, "stale entry, refreshing in background");

        tokio::spawn(async move {
            let _guard = guard;
            let value = match compute().await {
                Ok(value) => value,
                Err(e) => {
                    let e: BoxError = e.into();
                    telemetry::record_refresh(false);
                    tracing::warn!(key = %key, error = %e, "background refresh failed, keeping stale value");
                    return;
                }
            };
            match cache.write_entry(&key, &value, ttl_secs, &tags).await {
                Ok(()) => {
                    telemetry::record_refresh(true);
                    tracing::debug!(key = %key, "background refresh stored");
                }
                Err(e) => {
                    telemetry::record_refresh(false);
                    tracing::warn!(key = %key, error = %e, "background refresh could not be stored");
                }
            }
        });
    }
}
