//! Interning of trace dimensions into compact integer identifiers.
//!
//! Spans repeat the same handful of schema URLs, operations, instrumentation libraries and tags
//! over and over. Before spans are persisted each of these dimensions is swapped for an
//! identifier handed out by the backing store, so the store never holds the same string payload
//! twice.
//!
//! # Components
//!
//! * [`DimensionCache`] is a typed view over a shared [`clock_cache::ClockCache`] and maps a
//!   dimension to the identifiers the store assigned to it.
//! * [`DimensionBatch`] collects the dimensions an ingestion unit has not seen yet, flushes them
//!   to a [`DimensionStore`] in one round trip and resolves identifiers afterwards.
//! * [`DimensionCaches`] owns the four process-wide caches and hands out a fresh set of
//!   [`DimensionBatches`] for every ingestion unit.
//!
//! # Ordering
//!
//! A flush submits its entries sorted by the dimension's natural order. Concurrent flushes from
//! different ingestion units may touch overlapping rows in the store; sorting makes every flush
//! take row locks in the same global order so that they cannot deadlock against each other.
//!
//! [`DimensionStore`]: store::DimensionStore
use std::{fmt::Display, sync::Arc};

pub mod batch;
pub mod cache;
pub mod config;
pub mod dimension;
pub mod instrumentation_lib;
pub mod operation;
pub mod schema_url;
pub mod store;
pub mod tag;

#[cfg(test)]
mod test_util;

pub use batch::DimensionBatch;
pub use cache::{CacheError, CachedIds, DimensionCache};
pub use config::CacheSizes;
pub use dimension::{Dimension, DimensionIds};
pub use instrumentation_lib::{
    InstrumentationLibrary, InstrumentationLibraryBatch, InstrumentationLibraryCache,
};
pub use operation::{Operation, OperationBatch, OperationCache};
pub use schema_url::{SchemaUrl, SchemaUrlBatch, SchemaUrlCache};
pub use tag::{Tag, TagBatch, TagCache, TagIds, TagType};

use store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("error getting {dimension} ID from cache for {key}: {source}")]
    CacheLookup {
        dimension: &'static str,
        key: String,
        source: CacheError,
    },

    #[error("{dimension} ID is {reason} for {key}")]
    UnresolvedId {
        dimension: &'static str,
        key: String,
        reason: UnresolvedReason,
    },

    #[error("failed to encode value of tag {key}: {source}")]
    TagValueEncoding {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to encode tag map: {0}")]
    TagMapEncoding(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A specialized `Error` for dimension interning errors
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why an identifier found in the cache can not be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The store returned NULL.
    Null,
    /// The store returned 0, which is reserved for "unset".
    Zero,
}

impl Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Zero => write!(f, "0"),
        }
    }
}

/// An identifier assigned by the store to a dimension.
///
/// Only ever constructed for identifiers that passed validation, so it is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DimensionId(i64);

impl DimensionId {
    pub const fn new(v: i64) -> Self {
        Self(v)
    }

    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl Display for DimensionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The caches shared by every ingestion unit of the process.
///
/// Built once at startup and passed to whatever spawns ingestion workers. Cloning is cheap and
/// yields handles onto the same caches.
#[derive(Debug, Clone)]
pub struct DimensionCaches {
    pub schema_urls: Arc<SchemaUrlCache>,
    pub operations: Arc<OperationCache>,
    pub instrumentation_libs: Arc<InstrumentationLibraryCache>,
    pub tags: Arc<TagCache>,
}

impl DimensionCaches {
    pub fn new(sizes: CacheSizes) -> Self {
        Self {
            schema_urls: Arc::new(DimensionCache::new(sizes.schema_url)),
            operations: Arc::new(DimensionCache::new(sizes.operation)),
            instrumentation_libs: Arc::new(DimensionCache::new(sizes.instrumentation_lib)),
            tags: Arc::new(DimensionCache::new(sizes.tag)),
        }
    }

    /// Empty batches for a single ingestion unit, reading through these caches.
    pub fn new_batches(&self) -> DimensionBatches {
        DimensionBatches {
            schema_urls: DimensionBatch::new(Arc::clone(&self.schema_urls)),
            operations: DimensionBatch::new(Arc::clone(&self.operations)),
            instrumentation_libs: DimensionBatch::new(Arc::clone(&self.instrumentation_libs)),
            tags: DimensionBatch::new(Arc::clone(&self.tags)),
        }
    }
}

impl Default for DimensionCaches {
    fn default() -> Self {
        Self::new(CacheSizes::default())
    }
}

/// One batch per dimension, owned by a single ingestion unit and flushed once.
///
/// Instrumentation libraries reference schema URL identifiers, so `schema_urls` has to be
/// flushed before instrumentation libraries are queued.
#[derive(Debug)]
pub struct DimensionBatches {
    pub schema_urls: SchemaUrlBatch,
    pub operations: OperationBatch,
    pub instrumentation_libs: InstrumentationLibraryBatch,
    pub tags: TagBatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_share_the_process_caches() {
        let caches = DimensionCaches::new(CacheSizes::default());
        let batches = caches.new_batches();

        caches
            .operations
            .set(Operation::new("svc", "span", "kind"), Some(3));

        assert_eq!(
            batches.operations.get_id("svc", "span", "kind").unwrap(),
            DimensionId::new(3)
        );
    }

    #[test]
    fn caches_are_sized_from_config() {
        let caches = DimensionCaches::new(CacheSizes {
            schema_url: 1,
            operation: 2,
            instrumentation_lib: 3,
            tag: 4,
        });

        assert_eq!(caches.schema_urls.max_weight(), 1);
        assert_eq!(caches.operations.max_weight(), 2);
        assert_eq!(caches.instrumentation_libs.max_weight(), 3);
        assert_eq!(caches.tags.max_weight(), 4);
    }

    #[test]
    fn unresolved_errors_name_the_cause() {
        let err = Error::UnresolvedId {
            dimension: "schema URL",
            key: "https://example.com".to_string(),
            reason: UnresolvedReason::Zero,
        };
        assert_eq!(err.to_string(), "schema URL ID is 0 for https://example.com");
    }
}
