//! Cache error types.

use tagcache_store::StoreError;

/// Boxed error produced by a caller-supplied compute function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A key that could not be invalidated, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFailure {
    /// The logical (or, for bulk deletes, physical) key.
    pub key: String,
    /// Why the key could not be removed.
    pub reason: String,
}

impl KeyFailure {
    pub fn new(key: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors returned by the cache core.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store could not be reached or rejected a command.
    #[error("Backing store unavailable: {0}")]
    Store(#[from] StoreError),

    /// The caller-supplied compute function failed on a miss.
    #[error("Compute failed for key '{key}': {source}")]
    Compute {
        key: String,
        #[source]
        source: BoxError,
    },

    /// A value could not be encoded for, or decoded from, the store.
    #[error("Serialization failed for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A bulk invalidation removed some keys but not all of them.
    #[error("Partial invalidation: {succeeded} succeeded, {} failed", .failed.len())]
    PartialInvalidation {
        succeeded: u64,
        failed: Vec<KeyFailure>,
    },

    /// The key is empty or collides with a reserved namespace.
    #[error("Invalid cache key '{0}'")]
    InvalidKey(String),

    /// TTL is zero or too large to express in milliseconds.
    #[error("TTL must be between 1 and {max} seconds", max = crate::entry::MAX_TTL_SECS)]
    InvalidTtl,
}

impl CacheError {
    pub fn compute(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Compute {
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn serialization(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            key: key.into(),
            source,
        }
    }

    /// Returns `true` if the backing store failed.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns `true` if the compute function failed.
    pub fn is_compute(&self) -> bool {
        matches!(self, Self::Compute { .. })
    }

    /// Returns `true` for a best-effort operation that left some keys behind.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialInvalidation { .. })
    }

    /// Returns `true` for argument validation errors.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidKey(_) | Self::InvalidTtl)
    }
}

/// Type alias for a cache result.
pub type CacheResult<T> = Result<T, CacheError>;
