//! In-memory backing store for tagcache.
//!
//! This crate provides an in-memory implementation of the `BackingStore`
//! trait from `tagcache-store`, using DashMap for concurrent access. It is
//! used for single-instance deployments (Redis disabled) and in tests.
//!
//! # Example
//!
//! ```ignore
//! use tagcache_store_memory::InMemoryStore;
//! use tagcache_store::BackingStore;
//!
//! let store = InMemoryStore::new();
//! store.set("cache:greeting", "\"hello\"", 60).await?;
//! assert_eq!(store.get("cache:greeting").await?.as_deref(), Some("\"hello\""));
//! ```

pub mod store;

// Re-export the BackingStore trait for convenience
pub use tagcache_store::{BackingStore, DynStore, StoreError};

pub use store::InMemoryStore;

/// Creates a new shareable in-memory store.
pub fn create_memory_store() -> DynStore {
    std::sync::Arc::new(InMemoryStore::new())
}
