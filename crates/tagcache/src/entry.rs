//! Entry metadata and the physical key layout.
//!
//! A logical key `k` occupies two store keys, `<prefix>k` (value) and
//! `<prefix>k:meta` (metadata), written together with the same TTL. Tag
//! indexes live at `<prefix>tag:<tag>` and never expire.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tagcache_store::glob::escape_glob;
use time::OffsetDateTime;

use crate::error::{CacheError, CacheResult};

/// Metadata stored alongside each cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    /// When the value was computed, in unix milliseconds.
    pub last_updated: i64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl EntryMeta {
    pub fn new(tags: BTreeSet<String>) -> Self {
        Self {
            last_updated: now_millis(),
            tags,
        }
    }

    /// Past the half-life threshold: older than `ttl_secs / 2`.
    pub fn is_stale(&self, ttl_secs: u64, now_ms: i64) -> bool {
        let half_life_ms = (ttl_secs.saturating_mul(1000) / 2) as i64;
        now_ms.saturating_sub(self.last_updated) > half_life_ms
    }
}

/// Largest accepted TTL; keeps `ttl * 1000` within `i64`.
pub const MAX_TTL_SECS: u64 = i64::MAX as u64 / 1000;

pub(crate) fn validate_ttl(ttl_secs: u64) -> CacheResult<()> {
    if ttl_secs == 0 || ttl_secs > MAX_TTL_SECS {
        return Err(CacheError::InvalidTtl);
    }
    Ok(())
}

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Maps logical keys and tags onto backing-store keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

impl KeySpace {
    pub const DEFAULT_PREFIX: &'static str = "cache:";
    const TAG_NAMESPACE: &'static str = "tag:";
    const META_SUFFIX: &'static str = ":meta";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Rejects keys that would collide with metadata or tag index keys.
    pub fn validate_key(&self, key: &str) -> CacheResult<()> {
        if key.is_empty()
            || key.starts_with(Self::TAG_NAMESPACE)
            || key.ends_with(Self::META_SUFFIX)
        {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    pub fn validate_tag(&self, tag: &str) -> CacheResult<()> {
        if tag.is_empty() {
            return Err(CacheError::InvalidKey(format!(
                "{}{}",
                Self::TAG_NAMESPACE,
                tag
            )));
        }
        Ok(())
    }

    pub fn value_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn meta_key(&self, key: &str) -> String {
        format!("{}{}{}", self.prefix, key, Self::META_SUFFIX)
    }

    pub fn tag_key(&self, tag: &str) -> String {
        format!("{}{}{}", self.prefix, Self::TAG_NAMESPACE, tag)
    }

    /// Pattern covering values and metadata of every key starting with `key_prefix`.
    ///
    /// With an empty `key_prefix` this also covers the tag indexes.
    pub fn entries_pattern(&self, key_prefix: &str) -> String {
        format!("{}{}*", escape_glob(&self.prefix), escape_glob(key_prefix))
    }

    /// Pattern covering the tag indexes of every tag starting with `tag_prefix`.
    pub fn tags_pattern(&self, tag_prefix: &str) -> String {
        format!(
            "{}{}{}*",
            escape_glob(&self.prefix),
            Self::TAG_NAMESPACE,
            escape_glob(tag_prefix)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = KeySpace::default();
        assert_eq!(keys.value_key("faction:stats"), "cache:faction:stats");
        assert_eq!(keys.meta_key("faction:stats"), "cache:faction:stats:meta");
        assert_eq!(keys.tag_key("faction-stats"), "cache:tag:faction-stats");
        assert_eq!(keys.entries_pattern("forum:"), "cache:forum:*");
        assert_eq!(keys.tags_pattern("forum"), "cache:tag:forum*");
    }

    #[test]
    fn test_reserved_keys_are_rejected() {
        let keys = KeySpace::default();
        assert!(keys.validate_key("").is_err());
        assert!(keys.validate_key("tag:x").is_err());
        assert!(keys.validate_key("thing:meta").is_err());
        assert!(keys.validate_key("forum:thread:7").is_ok());
        assert!(keys.validate_tag("").is_err());
    }

    #[test]
    fn test_meta_serializes_camel_case() {
        let meta = EntryMeta {
            last_updated: 1_700_000_000_000,
            tags: BTreeSet::from(["a".to_string()]),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"lastUpdated": 1_700_000_000_000i64, "tags": ["a"]})
        );
    }

    #[test]
    fn test_half_life_staleness() {
        let meta = EntryMeta {
            last_updated: 1_000_000,
            tags: BTreeSet::new(),
        };
        // ttl 300s: stale once older than 150s
        assert!(!meta.is_stale(300, 1_000_000 + 150_000));
        assert!(meta.is_stale(300, 1_000_000 + 150_001));
    }
}
