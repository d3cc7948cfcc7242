//! An in-memory [`DimensionStore`]. It can be used for testing or for running without a
//! database behind the ingester.
use std::{collections::HashMap, hash::Hash};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{BatchResults, BufferedResults, DimensionStore, Statement, StoreError};
use crate::tag::TagType;

/// In-memory store with "get or create" semantics for every statement.
///
/// Identifiers start at 1 and are handed out sequentially per kind of dimension.
#[derive(Debug, Default)]
pub struct MemDimensionStore {
    state: Mutex<MemState>,
}

#[derive(Debug, Default)]
struct MemState {
    schema_urls: HashMap<String, i64>,
    operations: HashMap<(String, String, String), i64>,
    instrumentation_libs: HashMap<(String, String, Option<i64>), i64>,
    tag_keys: HashMap<String, (i64, TagType)>,
    tags: HashMap<(String, String), (i64, TagType)>,
    batches: Vec<Vec<Statement>>,
}

impl MemDimensionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch submitted so far, in submission order.
    pub fn batches(&self) -> Vec<Vec<Statement>> {
        self.state.lock().batches.clone()
    }

    /// Union of every type a tag key was submitted with.
    pub fn tag_key_type(&self, key: &str) -> Option<TagType> {
        self.state.lock().tag_keys.get(key).map(|(_, t)| *t)
    }

    /// Number of distinct tag (key, value) pairs stored.
    pub fn tag_count(&self) -> usize {
        self.state.lock().tags.len()
    }
}

impl MemState {
    fn execute(&mut self, statement: &Statement) -> i64 {
        match statement {
            Statement::PutSchemaUrl { url } => get_or_create(&mut self.schema_urls, url.clone()),
            Statement::PutOperation {
                service_name,
                span_name,
                span_kind,
            } => get_or_create(
                &mut self.operations,
                (service_name.clone(), span_name.clone(), span_kind.clone()),
            ),
            Statement::PutInstrumentationLib {
                name,
                version,
                schema_url_id,
            } => get_or_create(
                &mut self.instrumentation_libs,
                (name.clone(), version.clone(), *schema_url_id),
            ),
            Statement::PutTagKey { key, tag_type } => {
                get_or_create_typed(&mut self.tag_keys, key.clone(), *tag_type)
            }
            Statement::PutTag {
                key,
                value,
                tag_type,
            } => get_or_create_typed(&mut self.tags, (key.clone(), value.clone()), *tag_type),
        }
    }
}

fn get_or_create<K: Eq + Hash>(ids: &mut HashMap<K, i64>, key: K) -> i64 {
    let next = ids.len() as i64 + 1;
    *ids.entry(key).or_insert(next)
}

fn get_or_create_typed<K: Eq + Hash>(
    ids: &mut HashMap<K, (i64, TagType)>,
    key: K,
    tag_type: TagType,
) -> i64 {
    let next = ids.len() as i64 + 1;
    let (id, types) = ids.entry(key).or_insert((next, tag_type));
    *types = *types | tag_type;
    *id
}

#[async_trait]
impl DimensionStore for MemDimensionStore {
    async fn send_batch(
        &self,
        cancel: &CancellationToken,
        statements: Vec<Statement>,
    ) -> Result<Box<dyn BatchResults>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let mut state = self.state.lock();
        let rows = statements
            .iter()
            .map(|statement| Some(state.execute(statement)))
            .collect::<Vec<_>>();
        debug!(statements = statements.len(), "executed in-memory batch");
        state.batches.push(statements);

        Ok(Box::new(BufferedResults::new(rows)))
    }
}
