//! The N5 chunk key encoding.

use crate::{array::ArrayIndices, metadata::Metadata, storage::StoreKey};

use super::{
    join_indices, split_indices, ChunkKeyEncodingTraits, ChunkKeySeparator, InvalidChunkKeyError,
};

/// The N5 chunk key encoding.
///
/// N5 orders dimensions fastest-varying first, so the key for a chunk with grid indices (k, j, i) is `i/j/k`.
/// N5 has no chunk key encoding metadata, so this encoding is not a registered plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct N5ChunkKeyEncoding;

impl ChunkKeyEncodingTraits for N5ChunkKeyEncoding {
    fn create_metadata(&self) -> Metadata {
        Metadata::new("n5")
    }

    fn separator(&self) -> ChunkKeySeparator {
        ChunkKeySeparator::Slash
    }

    fn encode(&self, chunk_grid_indices: &[u64]) -> StoreKey {
        let key = if chunk_grid_indices.is_empty() {
            "0".to_string()
        } else {
            join_indices(chunk_grid_indices.iter().rev().copied(), '/')
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
        let mut indices = split_indices(key, key, '/', dimensionality)?;
        indices.reverse();
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed() {
        let encoding = N5ChunkKeyEncoding;
        assert_eq!(encoding.encode(&[2, 0, 1]).as_str(), "1/0/2");
        assert_eq!(encoding.decode("1/0/2", 3).unwrap(), vec![2, 0, 1]);
        assert!(encoding.decode("attributes.json", 3).is_err());
    }
}
