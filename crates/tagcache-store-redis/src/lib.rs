//! Redis backing store for tagcache.
//!
//! Implements `BackingStore` on top of a `deadpool-redis` connection pool so
//! several application instances can share one cache.
//!
//! ## Command mapping
//!
//! | Contract          | Redis               |
//! |-------------------|---------------------|
//! | `get` / `set`     | `GET` / `SET EX`    |
//! | `delete`          | `DEL`               |
//! | `keys_matching`   | `SCAN MATCH` loop   |
//! | `set_*`           | `SADD` / `SREM` / `SMEMBERS` |
//! | `list_*`          | `LPUSH` / `LTRIM` / `LRANGE` |
//! | `increment`       | `INCRBY`            |
//! | `expire` / `ttl`  | `EXPIRE` / `TTL`    |

pub mod store;

pub use store::{RedisStore, RedisStoreConfig};
