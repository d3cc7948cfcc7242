//! Per ingestion unit accumulation and flushing of novel dimensions.
use std::{collections::HashSet, fmt::Display, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    DimensionId, Error, Result, UnresolvedReason,
    cache::DimensionCache,
    dimension::{Dimension, DimensionIds},
    store::{BatchResults, DimensionStore, StoreError},
};

/// Queues up dimensions to send to the store, sorting them before sending.
///
/// The sort avoids deadlocks between concurrent flushes in the store. Dimensions the cache
/// already resolves are never queued, and queuing the same dimension twice is a no-op, so the
/// same value is not sent repeatedly.
///
/// A batch belongs to a single ingestion unit and is flushed once.
#[derive(Debug)]
pub struct DimensionBatch<D: Dimension> {
    pending: HashSet<D>,
    cache: Arc<DimensionCache<D>>,
}

impl<D: Dimension> DimensionBatch<D> {
    pub fn new(cache: Arc<DimensionCache<D>>) -> Self {
        Self {
            pending: HashSet::new(),
            cache,
        }
    }

    /// Number of dimensions waiting to be sent.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn queue_key(&mut self, key: D) {
        if !self.cache.exists(&key) {
            self.pending.insert(key);
        }
    }

    /// Send every queued dimension to `store` in one batch and cache the identifiers returned.
    ///
    /// Identifiers are cached as their rows are read. When reading a row fails the error is
    /// returned straight away and everything cached until then stays cached. The store results
    /// are closed on every path; a close error is only reported if nothing failed before it.
    pub async fn send_batch(
        &mut self,
        cancel: &CancellationToken,
        store: &dyn DimensionStore,
    ) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut keys = self.pending.drain().collect::<Vec<_>>();
        keys.sort_unstable();

        let mut statements = Vec::with_capacity(keys.len() * D::Ids::ROWS);
        for key in &keys {
            key.statements(&mut statements);
        }
        debug!(
            dimension = D::NAME,
            entries = keys.len(),
            statements = statements.len(),
            "sending dimension batch"
        );

        let mut results = store.send_batch(cancel, statements).await?;
        let read = self.read_results(cancel, &keys, results.as_mut()).await;
        let closed = results.close().await;

        read?;
        closed?;
        Ok(())
    }

    async fn read_results(
        &self,
        cancel: &CancellationToken,
        keys: &[D],
        results: &mut dyn BatchResults,
    ) -> Result<()> {
        let mut rows = Vec::with_capacity(D::Ids::ROWS);
        for key in keys {
            rows.clear();
            for _ in 0..D::Ids::ROWS {
                // rows still buffered after a cancellation are not trusted
                if cancel.is_cancelled() {
                    return Err(StoreError::Cancelled.into());
                }
                rows.push(results.next_row().await?);
            }
            self.cache.set(key.clone(), D::Ids::from_rows(&rows));
        }
        Ok(())
    }

    /// Read the identifiers of `key` through the cache.
    pub(crate) fn lookup(&self, key: &D) -> Result<D::Ids> {
        self.cache.get(key).map_err(|source| Error::CacheLookup {
            dimension: D::NAME,
            key: key.to_string(),
            source,
        })
    }

    /// Read the identifier of `key` through the cache, rejecting NULL and 0.
    pub(crate) fn resolve(&self, key: &D) -> Result<DimensionId>
    where
        D: Dimension<Ids = Option<i64>>,
    {
        validate_id(D::NAME, key, self.lookup(key)?)
    }
}

/// An identifier is only usable when present and non-zero.
pub(crate) fn validate_id(
    dimension: &'static str,
    key: &dyn Display,
    id: Option<i64>,
) -> Result<DimensionId> {
    let reason = match id {
        Some(0) => UnresolvedReason::Zero,
        Some(id) => return Ok(DimensionId::new(id)),
        None => UnresolvedReason::Null,
    };
    Err(Error::UnresolvedId {
        dimension,
        key: key.to_string(),
        reason,
    })
}
