use std::fmt::Display;

use crate::{
    DimensionId, Result,
    batch::DimensionBatch,
    cache::DimensionCache,
    dimension::Dimension,
    store::Statement,
};

pub type OperationCache = DimensionCache<Operation>;
pub type OperationBatch = DimensionBatch<Operation>;

/// A span name as emitted by one service for one span kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Operation {
    service_name: String,
    span_name: String,
    span_kind: String,
}

impl Operation {
    pub fn new(
        service_name: impl Into<String>,
        span_name: impl Into<String>,
        span_kind: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            span_name: span_name.into(),
            span_kind: span_kind.into(),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "service: {}, span: {}, kind: {}",
            self.service_name, self.span_name, self.span_kind
        )
    }
}

impl Dimension for Operation {
    type Ids = Option<i64>;

    const NAME: &'static str = "operation";

    fn weight(&self) -> u64 {
        (self.service_name.len() + self.span_name.len() + self.span_kind.len()) as u64
    }

    fn statements(&self, out: &mut Vec<Statement>) {
        out.push(Statement::PutOperation {
            service_name: self.service_name.clone(),
            span_name: self.span_name.clone(),
            span_kind: self.span_kind.clone(),
        });
    }
}

impl DimensionBatch<Operation> {
    pub fn queue(&mut self, service_name: &str, span_name: &str, span_kind: &str) {
        self.queue_key(Operation::new(service_name, span_name, span_kind));
    }

    pub fn get_id(
        &self,
        service_name: &str,
        span_name: &str,
        span_kind: &str,
    ) -> Result<DimensionId> {
        self.resolve(&Operation::new(service_name, span_name, span_kind))
    }
}
