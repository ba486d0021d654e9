//! Chunk key encodings.
//!
//! A chunk key encoding maps the grid indices of a chunk to a [`StoreKey`] relative to its array, and back.
//! Three encodings are provided:
//!  - [`default`](DefaultChunkKeyEncoding) (Zarr V3): `c/2/0/1` or `c.2.0.1`,
//!  - [`v2`](V2ChunkKeyEncoding) (Zarr V2): `2/0/1` or `2.0.1`, and
//!  - [`n5`](N5ChunkKeyEncoding): `1/0/2`, with the indices reversed.
//!
//! The separator decides the [`ChunkKeyLayout`]: `.` keeps every key in one directory level (flat), `/` nests one directory level per dimension.
//! Decoding is the exact inverse of encoding and rejects any key that encoding could not have produced,
//! so distinct grid indices never share a key.

mod default;
mod n5;
mod v2;

pub use default::{DefaultChunkKeyEncoding, DefaultChunkKeyEncodingConfiguration};
pub use n5::N5ChunkKeyEncoding;
pub use v2::{V2ChunkKeyEncoding, V2ChunkKeyEncodingConfiguration};

use std::sync::Arc;

use derive_more::{Deref, Display, From};
use thiserror::Error;

use crate::{
    array::ArrayIndices,
    metadata::Metadata,
    plugin::{Plugin, PluginCreateError},
    storage::StoreKey,
};

/// A chunk key encoding.
#[derive(Debug, Clone, From, Deref)]
pub struct ChunkKeyEncoding(Arc<dyn ChunkKeyEncodingTraits>);

/// A chunk key encoding plugin.
pub type ChunkKeyEncodingPlugin = Plugin<ChunkKeyEncoding>;
inventory::collect!(ChunkKeyEncodingPlugin);

impl ChunkKeyEncoding {
    /// Create a chunk key encoding.
    pub fn new<T: ChunkKeyEncodingTraits + 'static>(chunk_key_encoding: T) -> Self {
        let chunk_key_encoding: Arc<dyn ChunkKeyEncodingTraits> = Arc::new(chunk_key_encoding);
        chunk_key_encoding.into()
    }

    /// Create a chunk key encoding from metadata.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the metadata is invalid or not associated with a registered chunk key encoding plugin.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, PluginCreateError> {
        for plugin in inventory::iter::<ChunkKeyEncodingPlugin> {
            if plugin.match_name(metadata.name()) {
                return plugin.create(metadata);
            }
        }
        Err(PluginCreateError::Unsupported {
            name: metadata.name().to_string(),
            plugin_type: "chunk key encoding",
        })
    }
}

/// Chunk key encoding traits.
pub trait ChunkKeyEncodingTraits: core::fmt::Debug + Send + Sync {
    /// Create the metadata of this chunk key encoding.
    fn create_metadata(&self) -> Metadata;

    /// Returns the separator between chunk indices.
    fn separator(&self) -> ChunkKeySeparator;

    /// Returns the layout of the chunk keys.
    fn layout(&self) -> ChunkKeyLayout {
        self.separator().layout()
    }

    /// Encode chunk grid indices to a store key.
    fn encode(&self, chunk_grid_indices: &[u64]) -> StoreKey;

    /// Decode a store key of an array with `dimensionality` dimensions to chunk grid indices.
    ///
    /// # Errors
    /// Returns [`InvalidChunkKeyError`] if `key` could not have been produced by [`encode`](ChunkKeyEncodingTraits::encode).
    fn decode(&self, key: &str, dimensionality: usize) -> Result<ArrayIndices, InvalidChunkKeyError>;
}

/// A malformed chunk key.
#[derive(Debug, Clone, Error)]
#[error("invalid chunk key {key}: {reason}")]
pub struct InvalidChunkKeyError {
    key: String,
    reason: &'static str,
}

impl InvalidChunkKeyError {
    /// Create a new invalid chunk key error.
    #[must_use]
    pub fn new(key: &str, reason: &'static str) -> Self {
        Self {
            key: key.to_string(),
            reason,
        }
    }

    /// Returns the rejected key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// The chunk key separator.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum ChunkKeySeparator {
    /// The slash '/' character.
    #[display("/")]
    Slash,
    /// The dot '.' character.
    #[display(".")]
    Dot,
}

impl ChunkKeySeparator {
    /// Returns the separator as a [`char`].
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Slash => '/',
            Self::Dot => '.',
        }
    }

    /// Returns the layout that keys joined by this separator have.
    #[must_use]
    pub const fn layout(self) -> ChunkKeyLayout {
        match self {
            Self::Slash => ChunkKeyLayout::Nested,
            Self::Dot => ChunkKeyLayout::Flat,
        }
    }
}

impl TryFrom<char> for ChunkKeySeparator {
    type Error = char;

    fn try_from(separator: char) -> Result<Self, Self::Error> {
        match separator {
            '/' => Ok(Self::Slash),
            '.' => Ok(Self::Dot),
            _ => Err(separator),
        }
    }
}

impl serde::Serialize for ChunkKeySeparator {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_char(self.as_char())
    }
}

impl<'de> serde::Deserialize<'de> for ChunkKeySeparator {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let separator = String::deserialize(d)?;
        let mut chars = separator.chars();
        match (chars.next(), chars.next()) {
            (Some(separator), None) => Self::try_from(separator).ok(),
            _ => None,
        }
        .ok_or_else(|| serde::de::Error::custom("chunk key separator must be a `.` or `/`."))
    }
}

/// The layout of chunk keys in a store.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Default)]
pub enum ChunkKeyLayout {
    /// All chunk indices form one key component, e.g. `2.0.1`.
    #[display("flat")]
    Flat,
    /// Each chunk index is one key component, e.g. `2/0/1`.
    #[default]
    #[display("nested")]
    Nested,
}

impl ChunkKeyLayout {
    /// Returns the separator producing this layout.
    #[must_use]
    pub const fn separator(self) -> ChunkKeySeparator {
        match self {
            Self::Flat => ChunkKeySeparator::Dot,
            Self::Nested => ChunkKeySeparator::Slash,
        }
    }
}

/// Join chunk grid indices with `separator`.
fn join_indices(chunk_grid_indices: impl Iterator<Item = u64>, separator: char) -> String {
    let mut key = String::new();
    for (i, index) in chunk_grid_indices.enumerate() {
        if i > 0 {
            key.push(separator);
        }
        key.push_str(&index.to_string());
    }
    key
}

/// Split `indices` on `separator` into exactly `dimensionality` canonical decimal integers.
fn split_indices(
    key: &str,
    indices: &str,
    separator: char,
    dimensionality: usize,
) -> Result<ArrayIndices, InvalidChunkKeyError> {
    let chunk_grid_indices = indices
        .split(separator)
        .map(|index| parse_index(key, index))
        .collect::<Result<ArrayIndices, _>>()?;
    if chunk_grid_indices.len() == dimensionality {
        Ok(chunk_grid_indices)
    } else {
        Err(InvalidChunkKeyError::new(key, "incorrect number of chunk indices"))
    }
}

/// Parse one chunk index, accepting only the form that [`u64::to_string`] produces.
fn parse_index(key: &str, index: &str) -> Result<u64, InvalidChunkKeyError> {
    let canonical = !index.is_empty()
        && index.bytes().all(|byte| byte.is_ascii_digit())
        && (index == "0" || !index.starts_with('0'));
    if !canonical {
        return Err(InvalidChunkKeyError::new(key, "chunk index is not a decimal integer"));
    }
    index
        .parse()
        .map_err(|_| InvalidChunkKeyError::new(key, "chunk index is out of range"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::array_subset::ArraySubset;

    #[test]
    fn separator_serde() {
        assert_eq!(
            serde_json::to_string(&ChunkKeySeparator::Dot).unwrap(),
            r#"".""#
        );
        assert_eq!(
            serde_json::from_str::<ChunkKeySeparator>(r#""/""#).unwrap(),
            ChunkKeySeparator::Slash
        );
        assert!(serde_json::from_str::<ChunkKeySeparator>(r#""-""#).is_err());
        assert!(serde_json::from_str::<ChunkKeySeparator>(r#""//""#).is_err());
        assert_eq!(ChunkKeySeparator::try_from('-'), Err('-'));
    }

    #[test]
    fn layout_separator() {
        assert_eq!(ChunkKeyLayout::Flat.separator(), ChunkKeySeparator::Dot);
        assert_eq!(ChunkKeySeparator::Slash.layout(), ChunkKeyLayout::Nested);
    }

    #[test]
    fn parse_index_canonical() {
        assert_eq!(parse_index("k", "0").unwrap(), 0);
        assert_eq!(parse_index("k", "120").unwrap(), 120);
        assert!(parse_index("k", "01").is_err());
        assert!(parse_index("k", "+1").is_err());
        assert!(parse_index("k", "").is_err());
        assert!(parse_index("k", "-1").is_err());
        assert!(parse_index("k", "99999999999999999999999").is_err());
    }

    #[test]
    fn collision_free_and_reversible() {
        // 500x500x3 with 150x150x1 chunks: a 4x4x3 chunk grid
        let grid = ArraySubset::new_with_shape(vec![4, 4, 3]);
        let encodings = [
            ChunkKeyEncoding::new(DefaultChunkKeyEncoding::new(ChunkKeySeparator::Slash)),
            ChunkKeyEncoding::new(DefaultChunkKeyEncoding::new(ChunkKeySeparator::Dot)),
            ChunkKeyEncoding::new(V2ChunkKeyEncoding::new(ChunkKeySeparator::Slash)),
            ChunkKeyEncoding::new(V2ChunkKeyEncoding::new(ChunkKeySeparator::Dot)),
            ChunkKeyEncoding::new(N5ChunkKeyEncoding),
        ];
        for encoding in encodings {
            let mut keys = HashSet::new();
            for indices in grid.indices() {
                let key = encoding.encode(&indices);
                assert_eq!(encoding.decode(key.as_str(), 3).unwrap(), indices);
                keys.insert(key);
            }
            assert_eq!(keys.len() as u64, grid.num_elements());
        }
    }

    #[test]
    fn from_metadata() {
        let metadata: Metadata =
            serde_json::from_str(r#"{"name":"v2","configuration":{"separator":"/"}}"#).unwrap();
        let encoding = ChunkKeyEncoding::from_metadata(&metadata).unwrap();
        assert_eq!(encoding.encode(&[2, 0, 1]).as_str(), "2/0/1");
        assert_eq!(encoding.create_metadata(), metadata);

        let metadata: Metadata = serde_json::from_str(r#"{"name":"unknown"}"#).unwrap();
        assert!(ChunkKeyEncoding::from_metadata(&metadata).is_err());
    }
}
