//! The interface of the store that assigns dimension identifiers.
//!
//! A store accepts a batch of [`Statement`]s, executes them in submission order and yields
//! exactly one result row per statement, in the same order. Every statement is a "get or create"
//! so that two ingestion units submitting the same dimension concurrently end up with the same
//! identifier.
use std::{collections::VecDeque, fmt::Debug};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::tag::TagType;

pub mod mem;
pub mod postgres;

/// Dynamic error type for store implementations outside this crate.
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request was cancelled")]
    Cancelled,

    #[error("store returned {read} result rows but more were requested")]
    ResultsExhausted { read: usize },

    #[error("unhandled sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    External(DynError),
}

/// One "assign or return the existing identifier" request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    PutSchemaUrl {
        url: String,
    },
    PutOperation {
        service_name: String,
        span_name: String,
        span_kind: String,
    },
    PutInstrumentationLib {
        name: String,
        version: String,
        schema_url_id: Option<i64>,
    },
    PutTagKey {
        key: String,
        tag_type: TagType,
    },
    PutTag {
        key: String,
        value: String,
        tag_type: TagType,
    },
}

/// A store able to execute a batch of [`Statement`]s in one round trip.
#[async_trait]
pub trait DimensionStore: Debug + Send + Sync {
    /// Submit `statements` as one batch.
    ///
    /// Implementations must abort with [`StoreError::Cancelled`] when `cancel` fires before the
    /// batch completes.
    async fn send_batch(
        &self,
        cancel: &CancellationToken,
        statements: Vec<Statement>,
    ) -> Result<Box<dyn BatchResults>, StoreError>;
}

/// The result rows of one submitted batch.
///
/// The caller must [`close`](Self::close) the results once done, on every path.
#[async_trait]
pub trait BatchResults: Debug + Send {
    /// The identifier of the next statement, in submission order.
    async fn next_row(&mut self) -> Result<Option<i64>, StoreError>;

    /// Release the underlying resources.
    async fn close(&mut self) -> Result<(), StoreError>;
}

/// [`BatchResults`] over rows that were already fetched.
#[derive(Debug, Default)]
pub struct BufferedResults {
    rows: VecDeque<Option<i64>>,
    read: usize,
}

impl BufferedResults {
    pub fn new(rows: impl IntoIterator<Item = Option<i64>>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            read: 0,
        }
    }
}

#[async_trait]
impl BatchResults for BufferedResults {
    async fn next_row(&mut self) -> Result<Option<i64>, StoreError> {
        let row = self
            .rows
            .pop_front()
            .ok_or(StoreError::ResultsExhausted { read: self.read })?;
        self.read += 1;
        Ok(row)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.rows.clear();
        Ok(())
    }
}
