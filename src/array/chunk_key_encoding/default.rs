//! The `default` chunk key encoding.

use serde::{Deserialize, Serialize};

use crate::{
    array::ArrayIndices,
    metadata::Metadata,
    plugin::PluginCreateError,
    storage::StoreKey,
};

use super::{
    join_indices, split_indices, ChunkKeyEncoding, ChunkKeyEncodingPlugin, ChunkKeyEncodingTraits,
    ChunkKeySeparator, InvalidChunkKeyError,
};

const IDENTIFIER: &str = "default";

// Register the chunk key encoding.
inventory::submit! {
    ChunkKeyEncodingPlugin::new(IDENTIFIER, is_name_default, create_chunk_key_encoding_default)
}

fn is_name_default(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_chunk_key_encoding_default(
    metadata: &Metadata,
) -> Result<ChunkKeyEncoding, PluginCreateError> {
    let configuration: DefaultChunkKeyEncodingConfiguration = metadata
        .to_configuration()
        .map_err(|_| PluginCreateError::metadata_invalid(IDENTIFIER, "chunk key encoding", metadata))?;
    Ok(ChunkKeyEncoding::new(DefaultChunkKeyEncoding::new(
        configuration.separator,
    )))
}

/// A `default` chunk key encoding configuration.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct DefaultChunkKeyEncodingConfiguration {
    /// The chunk key separator.
    #[serde(default = "default_separator")]
    pub separator: ChunkKeySeparator,
}

const fn default_separator() -> ChunkKeySeparator {
    ChunkKeySeparator::Slash
}

/// A `default` chunk key encoding.
///
/// The key for a chunk with grid indices (k, j, i, ...) is the prefix `c` followed, for each dimension, by the separator and the decimal chunk index.
#[derive(Debug, Clone)]
pub struct DefaultChunkKeyEncoding {
    separator: ChunkKeySeparator,
}

impl DefaultChunkKeyEncoding {
    /// Create a new `default` chunk key encoding with `separator`.
    #[must_use]
    pub const fn new(separator: ChunkKeySeparator) -> Self {
        Self { separator }
    }
}

impl Default for DefaultChunkKeyEncoding {
    fn default() -> Self {
        Self::new(default_separator())
    }
}

impl ChunkKeyEncodingTraits for DefaultChunkKeyEncoding {
    fn create_metadata(&self) -> Metadata {
        let mut configuration = serde_json::Map::new();
        configuration.insert("separator".to_string(), self.separator.to_string().into());
        Metadata::new_with_configuration(IDENTIFIER, configuration)
    }

    fn separator(&self) -> ChunkKeySeparator {
        self.separator
    }

    fn encode(&self, chunk_grid_indices: &[u64]) -> StoreKey {
        let separator = self.separator.as_char();
        let mut key = "c".to_string();
        if !chunk_grid_indices.is_empty() {
            key.push(separator);
            key.push_str(&join_indices(chunk_grid_indices.iter().copied(), separator));
        }
        StoreKey::from_validated(key)
    }

    fn decode(&self, key: &str, dimensionality: usize) -> Result<ArrayIndices, InvalidChunkKeyError> {
        if dimensionality == 0 {
            return if key == "c" {
                Ok(vec![])
            } else {
                Err(InvalidChunkKeyError::new(key, "expected c"))
            };
        }
        let indices = key
            .strip_prefix('c')
            .and_then(|key| key.strip_prefix(self.separator.as_char()))
            .ok_or_else(|| InvalidChunkKeyError::new(key, "missing c prefix"))?;
        split_indices(key, indices, self.separator.as_char(), dimensionality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_nd() {
        let encoding = DefaultChunkKeyEncoding::new(ChunkKeySeparator::Slash);
        assert_eq!(encoding.encode(&[1, 23, 45]).as_str(), "c/1/23/45");
        assert_eq!(encoding.decode("c/1/23/45", 3).unwrap(), vec![1, 23, 45]);
    }

    #[test]
    fn dot_nd() {
        let encoding = DefaultChunkKeyEncoding::new(ChunkKeySeparator::Dot);
        assert_eq!(encoding.encode(&[1, 23, 45]).as_str(), "c.1.23.45");
        assert_eq!(encoding.decode("c.1.23.45", 3).unwrap(), vec![1, 23, 45]);
    }

    #[test]
    fn scalar() {
        let encoding = DefaultChunkKeyEncoding::default();
        assert_eq!(encoding.encode(&[]).as_str(), "c");
        assert_eq!(encoding.decode("c", 0).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn malformed() {
        let encoding = DefaultChunkKeyEncoding::new(ChunkKeySeparator::Slash);
        assert!(encoding.decode("1/23/45", 3).is_err());
        assert!(encoding.decode("c.1.23.45", 3).is_err());
        assert!(encoding.decode("c/1/23", 3).is_err());
        assert!(encoding.decode("c/1/023/45", 3).is_err());
        assert!(encoding.decode("c/1//45", 3).is_err());
        assert!(encoding.decode("c1/23/45", 3).is_err());
    }
}
