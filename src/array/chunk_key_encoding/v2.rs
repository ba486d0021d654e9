//! The `v2` chunk key encoding.

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

const IDENTIFIER: &str = "v2";

// Register the chunk key encoding.
inventory::submit! {
    ChunkKeyEncodingPlugin::new(IDENTIFIER, is_name_v2, create_chunk_key_encoding_v2)
}

fn is_name_v2(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_chunk_key_encoding_v2(metadata: &Metadata) -> Result<ChunkKeyEncoding, PluginCreateError> {
    let configuration: V2ChunkKeyEncodingConfiguration = metadata
        .to_configuration()
        .map_err(|_| PluginCreateError::metadata_invalid(IDENTIFIER, "chunk key encoding", metadata))?;
    Ok(ChunkKeyEncoding::new(V2ChunkKeyEncoding::new(
        configuration.separator,
    )))
}

/// A `v2` chunk key encoding configuration.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct V2ChunkKeyEncodingConfiguration {
    /// The chunk key separator.
    #[serde(default = "default_separator")]
    pub separator: ChunkKeySeparator,
}

const fn default_separator() -> ChunkKeySeparator {
    ChunkKeySeparator::Dot
}

/// A `v2` chunk key encoding.
///
/// The key for a chunk with grid indices (k, j, i, ...) is the decimal chunk indices joined by the separator.
/// The key of a zero-dimensional array is `0`.
#[derive(Debug, Clone)]
pub struct V2ChunkKeyEncoding {
    separator: ChunkKeySeparator,
}

impl V2ChunkKeyEncoding {
    /// Create a new `v2` chunk key encoding with `separator`.
    #[must_use]
    pub const fn new(separator: ChunkKeySeparator) -> Self {
        Self { separator }
    }
}

impl Default for V2ChunkKeyEncoding {
    fn default() -> Self {
        Self::new(default_separator())
    }
}

impl ChunkKeyEncodingTraits for V2ChunkKeyEncoding {
    fn create_metadata(&self) -> Metadata {
        let mut configuration = serde_json::Map::new();
        configuration.insert("separator".to_string(), self.separator.to_string().into());
        Metadata::new_with_configuration(IDENTIFIER, configuration)
    }

    fn separator(&self) -> ChunkKeySeparator {
        self.separator
    }

    fn encode(&self, chunk_grid_indices: &[u64]) -> StoreKey {
        let key = if chunk_grid_indices.is_empty() {
            "0".to_string()
        } else {
            join_indices(chunk_grid_indices.iter().copied(), self.separator.as_char())
        };
        StoreKey::from_validated(key)
    }

    fn decode(&self, key: &str, dimensionality: usize) -> Result<ArrayIndices, InvalidChunkKeyError> {
        if dimensionality == 0 {
            return if key == "0" {
                Ok(vec![])
            } else {
                Err(InvalidChunkKeyError::new(key, "expected 0"))
            };
        }
        split_indices(key, key, self.separator.as_char(), dimensionality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat() {
        let encoding = V2ChunkKeyEncoding::new(ChunkKeySeparator::Dot);
        assert_eq!(encoding.encode(&[2, 0, 1]).as_str(), "2.0.1");
        assert_eq!(encoding.decode("2.0.1", 3).unwrap(), vec![2, 0, 1]);
        assert!(encoding.decode("2/0/1", 3).is_err());
    }

    #[test]
    fn nested() {
        let encoding = V2ChunkKeyEncoding::new(ChunkKeySeparator::Slash);
        assert_eq!(encoding.encode(&[2, 0, 1]).as_str(), "2/0/1");
        assert_eq!(encoding.decode("2/0/1", 3).unwrap(), vec![2, 0, 1]);
        assert!(encoding.decode("2.0.1", 3).is_err());
        assert!(encoding.decode(".zarray", 3).is_err());
    }

    #[test]
    fn scalar() {
        let encoding = V2ChunkKeyEncoding::default();
        assert_eq!(encoding.encode(&[]).as_str(), "0");
        assert!(encoding.decode("0", 0).unwrap().is_empty());
        assert!(encoding.decode("1", 0).is_err());
    }
}
