//! Span, resource, event and link attributes.
//!
//! A tag resolves to two identifiers: one for its key and one for the (key, value) pair. Values
//! are stored JSON encoded so that attributes of any type share one representation.
use std::{collections::BTreeMap, fmt::Display, ops::BitOr};

use serde::Serialize;

use crate::{
    Error, Result,
    batch::{DimensionBatch, validate_id},
    cache::{CachedIds, DimensionCache},
    dimension::{Dimension, DimensionIds, NULLABLE_ID_WEIGHT},
    store::Statement,
};

pub type TagCache = DimensionCache<Tag>;
pub type TagBatch = DimensionBatch<Tag>;

/// Accounted size of a [`TagType`] inside a tag key.
const TAG_TYPE_WEIGHT: u64 = 8;

/// Where in a trace a tag was attached. Types combine as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TagType(i16);

impl TagType {
    pub const SPAN: Self = Self(1);
    pub const RESOURCE: Self = Self(1 << 1);
    pub const EVENT: Self = Self(1 << 2);
    pub const LINK: Self = Self(1 << 3);

    pub const fn from_bits(bits: i16) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> i16 {
        self.0
    }

    /// Whether every type set in `other` is also set in `self`.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TagType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (Self::SPAN, "span"),
            (Self::RESOURCE, "resource"),
            (Self::EVENT, "event"),
            (Self::LINK, "link"),
        ];

        let mut first = true;
        for (tag_type, name) in names {
            if self.contains(tag_type) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            write!(f, "{}", self.0)?;
        }
        Ok(())
    }
}

/// A tag key with its JSON encoded value.
///
/// Ordered by key, then encoded value, then type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    key: String,
    value: String,
    tag_type: TagType,
}

impl Tag {
    /// Build a tag from a value that is already JSON encoded.
    pub fn new(key: impl Into<String>, value: impl Into<String>, tag_type: TagType) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            tag_type,
        }
    }

    /// Build a tag, JSON encoding `value`.
    ///
    /// Objects are encoded with their keys sorted, so equal values always encode to the same
    /// string whatever map type or iteration order they come from.
    pub fn encode<V: Serialize + ?Sized>(key: &str, value: &V, tag_type: TagType) -> Result<Self> {
        let encoding_error = |source| Error::TagValueEncoding {
            key: key.to_string(),
            source,
        };
        let value = serde_json::to_value(value).map_err(encoding_error)?;
        let value = serde_json::to_string(&value).map_err(encoding_error)?;
        Ok(Self::new(key, value, tag_type))
    }

    /// The JSON encoded value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "key: {}, value: {}, type: {}",
            self.key, self.value, self.tag_type
        )
    }
}

/// Identifiers of a tag key and of the (key, value) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagIds {
    pub key_id: Option<i64>,
    pub value_id: Option<i64>,
}

impl Dimension for Tag {
    type Ids = TagIds;

    const NAME: &'static str = "tag";

    fn weight(&self) -> u64 {
        (self.key.len() + self.value.len()) as u64 + TAG_TYPE_WEIGHT
    }

    fn statements(&self, out: &mut Vec<Statement>) {
        out.push(Statement::PutTagKey {
            key: self.key.clone(),
            tag_type: self.tag_type,
        });
        out.push(Statement::PutTag {
            key: self.key.clone(),
            value: self.value.clone(),
            tag_type: self.tag_type,
        });
    }
}

impl DimensionIds for TagIds {
    const ROWS: usize = 2;
    const WEIGHT: u64 = 2 * NULLABLE_ID_WEIGHT;

    fn from_rows(rows: &[Option<i64>]) -> Self {
        Self {
            key_id: rows.first().copied().flatten(),
            value_id: rows.get(1).copied().flatten(),
        }
    }

    fn into_cached(self) -> CachedIds {
        CachedIds::Tag(self)
    }

    fn from_cached(cached: CachedIds) -> Option<Self> {
        match cached {
            CachedIds::Tag(ids) => Some(ids),
            _ => None,
        }
    }
}

impl DimensionBatch<Tag> {
    /// Queue every `(key, value)` of `tags` with type `tag_type`.
    ///
    /// Fails on the first value that can not be JSON encoded. Tags queued before it stay queued.
    pub fn queue<K, V>(
        &mut self,
        tags: impl IntoIterator<Item = (K, V)>,
        tag_type: TagType,
    ) -> Result<()>
    where
        K: AsRef<str>,
        V: Serialize,
    {
        for (key, value) in tags {
            self.queue_key(Tag::encode(key.as_ref(), &value, tag_type)?);
        }
        Ok(())
    }

    /// Map each tag's key identifier to its value identifier.
    ///
    /// Fails if any tag is missing from the cache or has a NULL or 0 identifier.
    pub fn get_tag_map<K, V>(
        &self,
        tags: impl IntoIterator<Item = (K, V)>,
        tag_type: TagType,
    ) -> Result<BTreeMap<i64, i64>>
    where
        K: AsRef<str>,
        V: Serialize,
    {
        let mut map = BTreeMap::new();
        for (key, value) in tags {
            let tag = Tag::encode(key.as_ref(), &value, tag_type)?;
            let ids = self.lookup(&tag)?;
            let key_id = validate_id("tag key", &tag, ids.key_id)?;
            let value_id = validate_id("tag value", &tag, ids.value_id)?;
            map.insert(key_id.get(), value_id.get());
        }
        Ok(map)
    }

    /// [`get_tag_map`](Self::get_tag_map) encoded as a JSON object.
    pub fn get_tag_map_json<K, V>(
        &self,
        tags: impl IntoIterator<Item = (K, V)>,
        tag_type: TagType,
    ) -> Result<Vec<u8>>
    where
        K: AsRef<str>,
        V: Serialize,
    {
        let map = self.get_tag_map(tags, tag_type)?;
        serde_json::to_vec(&map).map_err(Error::TagMapEncoding)
    }
}
