//! Typed dimension caches over a [`ClockCache`].
use clock_cache::ClockCache;

use crate::{
    dimension::{Dimension, DimensionIds},
    tag::TagIds,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("entry not found")]
    EntryNotFound,

    #[error("invalid cache entry type")]
    InvalidCacheEntryType,
}

/// Value held by the underlying [`ClockCache`].
///
/// All dimension caches share this representation, so a read re-checks that the stored shape
/// matches what the dimension expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedIds {
    Single(Option<i64>),
    Tag(TagIds),
}

/// Maps a dimension to the identifiers the store assigned it.
///
/// Entries are weighted by the byte length of their strings plus a fixed overhead per
/// identifier and may be evicted at any time; a miss only ever costs a redundant write.
#[derive(Debug)]
pub struct DimensionCache<D: Dimension> {
    cache: ClockCache<D, CachedIds>,
}

impl<D: Dimension> DimensionCache<D> {
    /// Create a cache holding at most `max_weight` bytes worth of entries.
    pub fn new(max_weight: u64) -> Self {
        Self {
            cache: ClockCache::new(max_weight),
        }
    }

    /// The identifiers cached for `key`, marking the entry as recently used.
    ///
    /// Fails with [`CacheError::EntryNotFound`] when `key` was never set or has been evicted, and
    /// with [`CacheError::InvalidCacheEntryType`] when the entry holds identifiers of another
    /// dimension's shape.
    pub fn get(&self, key: &D) -> Result<D::Ids, CacheError> {
        let cached = self.cache.get(key).ok_or(CacheError::EntryNotFound)?;
        D::Ids::from_cached(cached).ok_or(CacheError::InvalidCacheEntryType)
    }

    /// Cache `ids` for `key`, replacing any previous entry and evicting others as needed.
    pub fn set(&self, key: D, ids: D::Ids) {
        let weight = key.weight() + D::Ids::WEIGHT;
        self.cache.insert(key, ids.into_cached(), weight);
    }

    /// Whether [`get`](Self::get) would succeed for `key`.
    pub fn exists(&self, key: &D) -> bool {
        self.get(key).is_ok()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Bytes currently accounted.
    pub fn weight(&self) -> u64 {
        self.cache.weight()
    }

    pub fn max_weight(&self) -> u64 {
        self.cache.max_weight()
    }

    /// Direct access to the untyped cache, for planting entries of the wrong shape.
    #[cfg(test)]
    pub(crate) fn raw(&self) -> &ClockCache<D, CachedIds> {
        &self.cache
    }
}
