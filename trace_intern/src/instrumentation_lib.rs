use std::fmt::Display;

use crate::{
    DimensionId, Result,
    batch::DimensionBatch,
    cache::DimensionCache,
    dimension::{Dimension, NULLABLE_ID_WEIGHT},
    store::Statement,
};

pub type InstrumentationLibraryCache = DimensionCache<InstrumentationLibrary>;
pub type InstrumentationLibraryBatch = DimensionBatch<InstrumentationLibrary>;

/// The library that produced a span, optionally tied to the schema URL it reports.
///
/// Ordered by name, then version, then schema URL identifier with a missing identifier first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrumentationLibrary {
    name: String,
    version: String,
    schema_url_id: Option<DimensionId>,
}

impl InstrumentationLibrary {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        schema_url_id: Option<DimensionId>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            schema_url_id,
        }
    }
}

impl Display for InstrumentationLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "name: {}, version: {}, schema URL ID: ", self.name, self.version)?;
        match self.schema_url_id {
            Some(id) => write!(f, "{id}"),
            None => write!(f, "none"),
        }
    }
}

impl Dimension for InstrumentationLibrary {
    type Ids = Option<i64>;

    const NAME: &'static str = "instrumentation library";

    fn weight(&self) -> u64 {
        (self.name.len() + self.version.len()) as u64 + NULLABLE_ID_WEIGHT
    }

    fn statements(&self, out: &mut Vec<Statement>) {
        out.push(Statement::PutInstrumentationLib {
            name: self.name.clone(),
            version: self.version.clone(),
            schema_url_id: self.schema_url_id.map(|id| id.get()),
        });
    }
}

impl DimensionBatch<InstrumentationLibrary> {
    /// Queue a library unless its name is empty or it is already cached.
    pub fn queue(&mut self, name: &str, version: &str, schema_url_id: Option<DimensionId>) {
        if name.is_empty() {
            return;
        }
        self.queue_key(InstrumentationLibrary::new(name, version, schema_url_id));
    }

    /// The identifier of a library, or `None` when `name` is empty.
    pub fn get_id(
        &self,
        name: &str,
        version: &str,
        schema_url_id: Option<DimensionId>,
    ) -> Result<Option<DimensionId>> {
        if name.is_empty() {
            return Ok(None);
        }
        self.resolve(&InstrumentationLibrary::new(name, version, schema_url_id))
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{CacheError, CachedIds, Error, TagIds, test_util::FakeStore};

    #[test]
    fn test_instrumentation_library_cache() {
        let cache = InstrumentationLibraryCache::new(1000);

        let lib = InstrumentationLibrary::new("name", "version", Some(DimensionId::new(2)));
        let id = Some(6);

        assert!(!cache.exists(&lib));

        cache.set(lib.clone(), id);

        assert_eq!(cache.get(&lib).unwrap(), id);
        assert!(cache.exists(&lib));
        assert_eq!(cache.weight(), 4 + 7 + 9 + 9);

        assert_eq!(
            cache
                .get(&InstrumentationLibrary::new("non-existent", "", None))
                .unwrap_err(),
            CacheError::EntryNotFound
        );

        let invalid = InstrumentationLibrary::new("invalid", "", None);
        cache
            .raw()
            .insert(invalid.clone(), CachedIds::Tag(TagIds::default()), 0);

        assert_eq!(
            cache.get(&invalid).unwrap_err(),
            CacheError::InvalidCacheEntryType
        );
    }

    #[test]
    fn schema_url_id_is_part_of_the_key() {
        let cache = Arc::new(InstrumentationLibraryCache::new(1000));
        cache.set(InstrumentationLibrary::new("lib", "1.0", None), Some(1));
        let mut batch = InstrumentationLibraryBatch::new(cache);

        batch.queue("lib", "1.0", None);
        assert!(batch.is_empty());

        batch.queue("lib", "1.0", Some(DimensionId::new(5)));
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn empty_name_is_skipped() {
        let mut batch = InstrumentationLibraryBatch::new(Arc::new(
            InstrumentationLibraryCache::new(1000),
        ));
        let store = FakeStore::sequential();

        batch.queue("", "1.0", None);
        assert!(batch.is_empty());
        batch
            .send_batch(&CancellationToken::new(), &store)
            .await
            .unwrap();

        assert!(store.batches().is_empty());
        assert_eq!(batch.get_id("", "1.0", None).unwrap(), None);
    }

    #[tokio::test]
    async fn sorted_with_missing_schema_url_first() {
        let mut batch = InstrumentationLibraryBatch::new(Arc::new(
            InstrumentationLibraryCache::new(1000),
        ));
        let store = FakeStore::sequential();

        batch.queue("lib", "1.0", Some(DimensionId::new(10)));
        batch.queue("lib", "1.0", Some(DimensionId::new(9)));
        batch.queue("lib", "1.0", None);
        batch.queue("a-lib", "2.0", Some(DimensionId::new(1)));
        batch
            .send_batch(&CancellationToken::new(), &store)
            .await
            .unwrap();

        let sent = store.batches()[0]
            .iter()
            .map(|s| match s {
                Statement::PutInstrumentationLib {
                    name,
                    schema_url_id,
                    ..
                } => (name.clone(), *schema_url_id),
                other => panic!("unexpected statement {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            sent,
            [
                ("a-lib".to_string(), Some(1)),
                ("lib".to_string(), None),
                ("lib".to_string(), Some(9)),
                ("lib".to_string(), Some(10)),
            ]
        );

        assert_eq!(
            batch.get_id("lib", "1.0", None).unwrap(),
            Some(DimensionId::new(2))
        );
        assert_eq!(
            batch
                .get_id("lib", "1.0", Some(DimensionId::new(10)))
                .unwrap(),
            Some(DimensionId::new(4))
        );
    }

    #[tokio::test]
    async fn null_id_is_rejected() {
        let mut batch = InstrumentationLibraryBatch::new(Arc::new(
            InstrumentationLibraryCache::new(1000),
        ));
        let store = FakeStore::returning(None);

        batch.queue("lib", "1.0", None);
        batch
            .send_batch(&CancellationToken::new(), &store)
            .await
            .unwrap();

        let err = batch.get_id("lib", "1.0", None).unwrap_err();
        assert!(matches!(err, Error::UnresolvedId { .. }), "{err}");
        assert_eq!(
            err.to_string(),
            "instrumentation library ID is null for name: lib, version: 1.0, schema URL ID: none"
        );
    }
}
