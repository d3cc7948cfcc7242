use std::fmt::Display;

use crate::{
    DimensionId, Result,
    batch::DimensionBatch,
    cache::DimensionCache,
    dimension::Dimension,
    store::Statement,
};

pub type SchemaUrlCache = DimensionCache<SchemaUrl>;
pub type SchemaUrlBatch = DimensionBatch<SchemaUrl>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaUrl(String);

impl SchemaUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }
}

impl Display for SchemaUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "URL: {}", self.0)
    }
}

impl Dimension for SchemaUrl {
    type Ids = Option<i64>;

    const NAME: &'static str = "schema URL";

    fn weight(&self) -> u64 {
        self.0.len() as u64
    }

    fn statements(&self, out: &mut Vec<Statement>) {
        out.push(Statement::PutSchemaUrl {
            url: self.0.clone(),
        });
    }
}

impl DimensionBatch<SchemaUrl> {
    /// Queue `url` unless it is empty or already cached.
    pub fn queue(&mut self, url: &str) {
        if url.is_empty() {
            return;
        }
        self.queue_key(SchemaUrl::new(url));
    }

    /// The identifier of `url`, or `None` for the empty URL.
    pub fn get_id(&self, url: &str) -> Result<Option<DimensionId>> {
        if url.is_empty() {
            return Ok(None);
        }
        self.resolve(&SchemaUrl::new(url)).map(Some)
    }
}
