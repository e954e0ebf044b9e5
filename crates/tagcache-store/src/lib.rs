//! # tagcache-store
//!
//! Backing store abstraction for the tagcache caching layer.
//!
//! This crate defines the key-value contract that the cache core consumes.
//! It does not contain any implementations - those are provided by separate
//! crates (`tagcache-store-memory`, `tagcache-store-redis`).
//!
//! ## Overview
//!
//! The main trait is [`BackingStore`], which covers:
//! - plain values with TTL (get, set, delete, expire)
//! - administrative key scans (`keys_matching`)
//! - sets (tag indexes)
//! - lists (stats history)
//! - counters (stats totals, rate limiting)
//!
//! ## Example
//!
//! ```ignore
//! use tagcache_store::{BackingStore, StoreResult};
//!
//! async fn remember(store: &dyn BackingStore, key: &str) -> StoreResult<i64> {
//!     let count = store.increment(key, 1).await?;
//!     if count == 1 {
//!         store.expire(key, 60).await?;
//!     }
//!     Ok(count)
//! }
//! ```

mod error;
pub mod glob;
mod traits;

pub use error::{ErrorCategory, StoreError};
pub use traits::BackingStore;

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shareable backing store trait object.
pub type DynStore = std::sync::Arc<dyn BackingStore>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tagcache_store::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StoreError};
    pub use crate::glob::{escape_glob, glob_matches};
    pub use crate::traits::BackingStore;
    pub use crate::{DynStore, StoreResult};
}
