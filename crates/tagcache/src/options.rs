//! Per-call cache options.

use std::collections::BTreeSet;

/// Options for [`TagCache::get_or_compute`](crate::TagCache::get_or_compute).
///
/// ```
/// use tagcache::CacheOptions;
///
/// let options = CacheOptions::new()
///     .with_tag("faction-stats")
///     .with_stale_while_revalidate(true);
/// assert!(options.tags.contains("faction-stats"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Tags to index the entry under for group invalidation.
    pub tags: BTreeSet<String>,
    /// Refresh in the background once an entry is past half its TTL.
    pub stale_while_revalidate: bool,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for tagged options with SWR enabled.
    pub fn swr<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().with_tags(tags).with_stale_while_revalidate(true)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CacheOptions::default();
        assert!(options.tags.is_empty());
        assert!(!options.stale_while_revalidate);
    }

    #[test]
    fn test_builder_dedupes_tags() {
        let options = CacheOptions::new()
            .with_tag("forum")
            .with_tags(["forum", "threads"]);
        assert_eq!(options.tags.len(), 2);
    }

    #[test]
    fn test_swr_shorthand() {
        let options = CacheOptions::swr(["faction-stats"]);
        assert!(options.stale_while_revalidate);
        assert!(options.tags.contains("faction-stats"));
    }
}
