//! A scripted [`DimensionStore`] for exercising batch flushes.
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::store::{BatchResults, DimensionStore, Statement, StoreError};

#[derive(Debug, Clone, Copy)]
enum Rows {
    /// Row `n` of a batch holds `n + 1`.
    Sequential,
    /// Every row holds the same value.
    Fixed(Option<i64>),
}

#[derive(Debug)]
pub(crate) struct FakeStore {
    rows: Rows,
    fail_send: bool,
    fail_on_row: Option<usize>,
    fail_close: bool,
    cancel_after_send: Option<CancellationToken>,
    batches: Mutex<Vec<Vec<Statement>>>,
    closes: Arc<AtomicUsize>,
}

impl FakeStore {
    fn with_rows(rows: Rows) -> Self {
        Self {
            rows,
            fail_send: false,
            fail_on_row: None,
            fail_close: false,
            cancel_after_send: None,
            batches: Default::default(),
            closes: Default::default(),
        }
    }

    pub(crate) fn sequential() -> Self {
        Self::with_rows(Rows::Sequential)
    }

    pub(crate) fn returning(id: Option<i64>) -> Self {
        Self::with_rows(Rows::Fixed(id))
    }

    /// Fail the submission itself.
    pub(crate) fn fail_send(self) -> Self {
        Self {
            fail_send: true,
            ..self
        }
    }

    /// Fail reading the row at index `row` of a batch.
    pub(crate) fn fail_on_row(self, row: usize) -> Self {
        Self {
            fail_on_row: Some(row),
            ..self
        }
    }

    pub(crate) fn fail_close(self) -> Self {
        Self {
            fail_close: true,
            ..self
        }
    }

    /// Fire `token` once the batch was accepted, before any row is read.
    pub(crate) fn cancel_after_send(self, token: CancellationToken) -> Self {
        Self {
            cancel_after_send: Some(token),
            ..self
        }
    }

    pub(crate) fn batches(&self) -> Vec<Vec<Statement>> {
        self.batches.lock().clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DimensionStore for FakeStore {
    async fn send_batch(
        &self,
        cancel: &CancellationToken,
        statements: Vec<Statement>,
    ) -> Result<Box<dyn BatchResults>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.fail_send {
            return Err(StoreError::External("send failed".into()));
        }

        let rows = (0..statements.len())
            .map(|n| match self.rows {
                Rows::Sequential => Some(n as i64 + 1),
                Rows::Fixed(id) => id,
            })
            .collect();
        self.batches.lock().push(statements);

        if let Some(token) = &self.cancel_after_send {
            token.cancel();
        }

        Ok(Box::new(FakeResults {
            rows,
            read: 0,
            fail_on_row: self.fail_on_row,
            fail_close: self.fail_close,
            closes: Arc::clone(&self.closes),
        }))
    }
}

#[derive(Debug)]
struct FakeResults {
    rows: VecDeque<Option<i64>>,
    read: usize,
    fail_on_row: Option<usize>,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BatchResults for FakeResults {
    async fn next_row(&mut self) -> Result<Option<i64>, StoreError> {
        if self.fail_on_row == Some(self.read) {
            return Err(StoreError::External(
                format!("scan failed on row {}", self.read).into(),
            ));
        }
        let row = self
            .rows
            .pop_front()
            .ok_or(StoreError::ResultsExhausted { read: self.read })?;
        self.read += 1;
        Ok(row)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(StoreError::External("close failed".into()));
        }
        Ok(())
    }
}
