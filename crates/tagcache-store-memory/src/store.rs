//! DashMap-backed store with lazy TTL expiry.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tagcache_store::glob::glob_matches;
use tagcache_store::{BackingStore, StoreError};

/// Value held under a key.
#[derive(Debug, Clone)]
enum StoredValue {
    Str(String),
    Set(HashSet<String>),
    List(VecDeque<String>),
}

impl StoredValue {
    fn type_name(&self) -> &'static str {
        match self {
            StoredValue::Str(_) => "string",
            StoredValue::Set(_) => "set",
            StoredValue::List(_) => "list",
        }
    }
}

/// A stored value with optional expiry.
#[derive(Debug, Clone)]
struct StoredEntry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn persistent(value: StoredValue) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| deadline <= Instant::now())
    }
}

/// In-memory backing store.
///
/// Expired entries are dropped lazily when touched; [`InMemoryStore::purge_expired`]
/// sweeps the whole map. Per-key operations are atomic because they run under
/// the DashMap shard lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, StoredEntry>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) keys.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .count()
    }

    /// Returns `true` if the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "purged expired in-memory store entries");
        }
        removed
    }

    /// Runs `f` against the live entry for `key`, if any.
    fn with_live<R>(&self, key: &str, f: impl FnOnce(&StoredEntry) -> R) -> Option<R> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Some(f(&entry));
            }
            // Drop the read guard before taking the shard write lock.
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }
        None
    }

    /// Returns a mutable slot for `key`, clearing it first if it has expired.
    fn live_entry(&self, key: &str) -> Entry<'_, String, StoredEntry> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) if occupied.get().is_expired() => {
                occupied.remove();
                self.entries.entry(key.to_string())
            }
            other => other,
        }
    }
}

/// Resolves a Redis-style inclusive range against a list length.
fn resolve_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { len + start } else { start }.max(0);
    let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Instant `ttl_secs` from now; errors when that is not representable.
fn deadline(command: &str, ttl_secs: u64) -> Result<Instant, StoreError> {
    Instant::now()
        .checked_add(Duration::from_secs(ttl_secs))
        .ok_or_else(|| StoreError::command(command, format!("ttl {ttl_secs}s out of range")))
}

#[async_trait]
impl BackingStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.with_live(key, |entry| entry.value.clone()) {
            None => Ok(None),
            Some(StoredValue::Str(value)) => Ok(Some(value)),
            Some(_) => Err(StoreError::wrong_type(key, "string")),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let expires_at = deadline("SET", ttl_secs)?;
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value: StoredValue::Str(value.to_string()),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        let mut removed = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(key) {
                if !entry.is_expired() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired() && glob_matches(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let expires_at = deadline("EXPIRE", ttl_secs)?;
        match self.live_entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().expires_at = Some(expires_at);
                Ok(true)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.with_live(key, |entry| match entry.expires_at {
            None => -1,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                // Round up so a key with 0.4s left still reports 1.
                remaining.as_millis().div_ceil(1000) as i64
            }
        }))
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        match self.live_entry(set_key) {
            Entry::Occupied(mut occupied) => match &mut occupied.get_mut().value {
                StoredValue::Set(members) => {
                    members.insert(member.to_string());
                    Ok(())
                }
                _ => Err(StoreError::wrong_type(set_key, "set")),
            },
            Entry::Vacant(vacant) => {
                let members = HashSet::from([member.to_string()]);
                vacant.insert(StoredEntry::persistent(StoredValue::Set(members)));
                Ok(())
            }
        }
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        match self.live_entry(set_key) {
            Entry::Occupied(mut occupied) => {
                let now_empty = match &mut occupied.get_mut().value {
                    StoredValue::Set(members) => {
                        members.remove(member);
                        members.is_empty()
                    }
                    _ => return Err(StoreError::wrong_type(set_key, "set")),
                };
                // Empty sets do not exist, same as Redis.
                if now_empty {
                    occupied.remove();
                }
                Ok(())
            }
            Entry::Vacant(_) => Ok(()),
        }
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, StoreError> {
        match self.with_live(set_key, |entry| entry.value.clone()) {
            None => Ok(Vec::new()),
            Some(StoredValue::Set(members)) => Ok(members.into_iter().collect()),
            Some(_) => Err(StoreError::wrong_type(set_key, "set")),
        }
    }

    async fn list_push_front(&self, list_key: &str, value: &str) -> Result<(), StoreError> {
        match self.live_entry(list_key) {
            Entry::Occupied(mut occupied) => match &mut occupied.get_mut().value {
                StoredValue::List(items) => {
                    items.push_front(value.to_string());
                    Ok(())
                }
                _ => Err(StoreError::wrong_type(list_key, "list")),
            },
            Entry::Vacant(vacant) => {
                let items = VecDeque::from([value.to_string()]);
                vacant.insert(StoredEntry::persistent(StoredValue::List(items)));
                Ok(())
            }
        }
    }

    async fn list_trim(&self, list_key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        match self.live_entry(list_key) {
            Entry::Occupied(mut occupied) => {
                let keep = match &mut occupied.get_mut().value {
                    StoredValue::List(items) => match resolve_range(start, stop, items.len()) {
                        Some((from, to)) => {
                            items.truncate(to + 1);
                            items.drain(..from);
                            true
                        }
                        None => false,
                    },
                    _ => return Err(StoreError::wrong_type(list_key, "list")),
                };
                if !keep {
                    occupied.remove();
                }
                Ok(())
            }
            Entry::Vacant(_) => Ok(()),
        }
    }

    async fn list_range(
        &self,
        list_key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        match self.with_live(list_key, |entry| entry.value.clone()) {
            None => Ok(Vec::new()),
            Some(StoredValue::List(items)) => Ok(match resolve_range(start, stop, items.len()) {
                Some((from, to)) => items.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => Err(StoreError::wrong_type(list_key, "list")),
        }
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        match self.live_entry(key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let current = match &entry.value {
                    StoredValue::Str(raw) => raw
                        .parse::<i64>()
                        .map_err(|_| StoreError::wrong_type(key, "counter"))?,
                    other => {
                        tracing::debug!(key, found = other.type_name(), "increment on non-counter");
                        return Err(StoreError::wrong_type(key, "counter"));
                    }
                };
                let next = current
                    .checked_add(by)
                    .ok_or_else(|| StoreError::command("INCRBY", "increment would overflow"))?;
                entry.value = StoredValue::Str(next.to_string());
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredEntry::persistent(StoredValue::Str(by.to_string())));
                Ok(by)
            }
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_delete() {
        let store = InMemoryStore::new();
        store.set("a", "1", 60).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

        let removed = store
            .delete(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_expire() {
        let store = InMemoryStore::new();
        store.set("short", "v", 1).await.unwrap();
        assert!(store.get("short").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(store.get("short").await.unwrap().is_none());
        assert_eq!(store.ttl("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_reporting() {
        let store = InMemoryStore::new();
        store.set("v", "x", 30).await.unwrap();
        store.set_add("s", "m").await.unwrap();

        let ttl = store.ttl("v").await.unwrap().unwrap();
        assert!((29..=30).contains(&ttl));
        assert_eq!(store.ttl("s").await.unwrap(), Some(-1));
        assert_eq!(store.ttl("nope").await.unwrap(), None);

        assert!(store.expire("s", 10).await.unwrap());
        assert!(!store.expire("nope", 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_rejected() {
        let store = InMemoryStore::new();
        let err = store.set("k", "v", u64::MAX).await.unwrap_err();
        assert!(!err.is_connection());
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v", 60).await.unwrap();
        assert!(store.expire("k", u64::MAX).await.is_err());
        let ttl = store.ttl("k").await.unwrap().unwrap();
        assert!((59..=60).contains(&ttl));
    }

    #[tokio::test]
    async fn test_sets() {
        let store = InMemoryStore::new();
        store.set_add("tags", "a").await.unwrap();
        store.set_add("tags", "b").await.unwrap();
        store.set_add("tags", "a").await.unwrap();

        let mut members = store.set_members("tags").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

        store.set_remove("tags", "a").await.unwrap();
        store.set_remove("tags", "b").await.unwrap();
        assert!(store.set_members("tags").await.unwrap().is_empty());
        assert!(store.is_empty());

        // Removing from a missing set is fine.
        store.set_remove("tags", "zzz").await.unwrap();
    }

    #[tokio::test]
    async fn test_lists_follow_redis_ranges() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store.list_push_front("l", &i.to_string()).await.unwrap();
        }
        assert_eq!(
            store.list_range("l", 0, -1).await.unwrap(),
            vec!["4", "3", "2", "1", "0"]
        );
        assert_eq!(store.list_range("l", 1, 2).await.unwrap(), vec!["3", "2"]);
        assert_eq!(store.list_range("l", -2, -1).await.unwrap(), vec!["1", "0"]);
        assert!(store.list_range("l", 10, 20).await.unwrap().is_empty());

        store.list_trim("l", 0, 2).await.unwrap();
        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), vec!["4", "3", "2"]);

        store.list_trim("l", 5, 10).await.unwrap();
        assert!(store.list_range("l", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_increment_preserves_expiry() {
        let store = InMemoryStore::new();
        assert_eq!(store.increment("c", 1).await.unwrap(), 1);
        assert_eq!(store.increment("c", 4).await.unwrap(), 5);
        assert_eq!(store.get("c").await.unwrap().as_deref(), Some("5"));

        store.expire("c", 30).await.unwrap();
        store.increment("c", 1).await.unwrap();
        assert!(store.ttl("c").await.unwrap().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_wrong_type_errors() {
        let store = InMemoryStore::new();
        store.set_add("set", "m").await.unwrap();
        store.set("text", "not-a-number", 60).await.unwrap();

        assert!(store.get("set").await.unwrap_err().is_wrong_type());
        assert!(store.increment("text", 1).await.unwrap_err().is_wrong_type());
        assert!(store.list_push_front("set", "x").await.unwrap_err().is_wrong_type());
        assert!(store.set_add("text", "x").await.unwrap_err().is_wrong_type());
    }

    #[tokio::test]
    async fn test_keys_matching() {
        let store = InMemoryStore::new();
        store.set("cache:a", "1", 60).await.unwrap();
        store.set("cache:a:meta", "{}", 60).await.unwrap();
        store.set_add("cache:tag:t", "a").await.unwrap();
        store.increment("stats:cache:hits", 1).await.unwrap();

        let mut keys = store.keys_matching("cache:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["cache:a", "cache:a:meta", "cache:tag:t"]);

        let tags = store.keys_matching("cache:tag:*").await.unwrap();
        assert_eq!(tags, vec!["cache:tag:t"]);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryStore::new();
        store.set("gone", "x", 0).await.unwrap();
        store.set("kept", "x", 60).await.unwrap();
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(0, -1, 3), Some((0, 2)));
        assert_eq!(resolve_range(0, 23, 3), Some((0, 2)));
        assert_eq!(resolve_range(-100, 0, 3), Some((0, 0)));
        assert_eq!(resolve_range(2, 1, 3), None);
        assert_eq!(resolve_range(0, -1, 0), None);
    }
}
