//! Backing store trait.
//!
//! This module defines the key-value contract that every backing store
//! implementation must provide.

use async_trait::async_trait;

use crate::error::StoreError;

/// The key-value contract consumed by the cache core.
///
/// The store owns durability and TTL expiry. Implementations must be
/// thread-safe (`Send + Sync`) and provide atomic per-key get/set/delete,
/// atomic set membership changes and atomic counter increments.
///
/// Values are opaque strings (the cache stores JSON text).
///
/// # Example
///
/// ```ignore
/// use tagcache_store::{BackingStore, StoreError};
///
/// async fn tag_members(store: &dyn BackingStore, tag: &str) -> Result<Vec<String>, StoreError> {
///     store.set_members(&format!("cache:tag:{tag}")).await
/// }
/// ```
#[async_trait]
pub trait BackingStore: Send + Sync {
    // ==================== Values ====================

    /// Reads a value.
    ///
    /// Returns `None` if the key does not exist or has expired.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WrongType` if the key holds a set, list or counter
    /// that cannot be read as a string.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value that expires after `ttl_secs` seconds.
    ///
    /// Overwrites whatever the key held before, including its type.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Deletes keys of any type, returning how many existed.
    ///
    /// Deleting a missing key is not an error.
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Lists keys matching a glob pattern (`*`, `?`, `\` escapes).
    ///
    /// This is O(n) over the keyspace and intended for administrative use only.
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Sets the expiry of an existing key.
    ///
    /// Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    /// Returns the remaining time-to-live of a key in seconds.
    ///
    /// `None` means the key does not exist, `Some(-1)` means it has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError>;

    // ==================== Sets ====================

    /// Adds a member to a set, creating the set if needed.
    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError>;

    /// Removes a member from a set. Missing sets and members are ignored.
    async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), StoreError>;

    /// Returns all members of a set (empty if the set does not exist).
    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, StoreError>;

    // ==================== Lists ====================

    /// Pushes a value to the front of a list, creating the list if needed.
    async fn list_push_front(&self, list_key: &str, value: &str) -> Result<(), StoreError>;

    /// Trims a list to the inclusive range `start..=stop`.
    ///
    /// Negative indexes count from the end of the list (`-1` is the last element).
    async fn list_trim(&self, list_key: &str, start: i64, stop: i64) -> Result<(), StoreError>;

    /// Returns the inclusive range `start..=stop` of a list.
    ///
    /// Negative indexes count from the end of the list.
    async fn list_range(
        &self,
        list_key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError>;

    // ==================== Counters ====================

    /// Atomically increments a counter by `by`, creating it at zero if needed.
    ///
    /// Returns the new value. An existing expiry is preserved.
    async fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError>;

    // ==================== Health ====================

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Returns a short name for this backend (for logging and health output).
    fn backend_name(&self) -> &'static str;
}
