//! The traits tying a dimension key to its identifiers, its weight and its store statements.
use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

use crate::{cache::CachedIds, store::Statement};

/// Accounted size of one nullable 64-bit identifier: 8 value bytes plus a validity flag.
pub const NULLABLE_ID_WEIGHT: u64 = 9;

/// A trace attribute interned to one or more identifiers.
///
/// The `Ord` implementation is the order a batch submits entries to the store in and must be a
/// total order over every field of the key.
pub trait Dimension: Clone + Debug + Display + Eq + Hash + Ord + Send + Sync + 'static {
    /// What the store resolves this dimension to.
    type Ids: DimensionIds;

    /// Name used in errors and logs.
    const NAME: &'static str;

    /// Accounted size of the key in bytes.
    fn weight(&self) -> u64;

    /// Append the statements resolving this key, one per row of [`DimensionIds::ROWS`].
    fn statements(&self, out: &mut Vec<Statement>);
}

/// Identifiers stored for a [`Dimension`].
pub trait DimensionIds: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// Result rows the store returns per entry.
    const ROWS: usize;

    /// Accounted size in bytes.
    const WEIGHT: u64;

    /// Build from exactly [`Self::ROWS`] result rows, in submission order.
    fn from_rows(rows: &[Option<i64>]) -> Self;

    fn into_cached(self) -> CachedIds;

    /// `None` if `cached` has a different shape.
    fn from_cached(cached: CachedIds) -> Option<Self>;
}

impl DimensionIds for Option<i64> {
    const ROWS: usize = 1;
    const WEIGHT: u64 = NULLABLE_ID_WEIGHT;

    fn from_rows(rows: &[Option<i64>]) -> Self {
        rows.first().copied().flatten()
    }

    fn into_cached(self) -> CachedIds {
        CachedIds::Single(self)
    }

    fn from_cached(cached: CachedIds) -> Option<Self> {
        match cached {
            CachedIds::Single(id) => Some(id),
            _ => None,
        }
    }
}
