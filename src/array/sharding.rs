//! Sharding.
//!
//! A shard is one stored object holding a regular grid of inner chunks, each encoded independently,
//! followed by a shard index (the `sharding_indexed` codec of Zarr V3).
//!
//! The shard index holds an `(offset, nbytes)` pair of `u64` for each inner chunk in row-major order.
//! Both are [`u64::MAX`] for a chunk that is not present.
//! The index is encoded with the index codecs (little-endian `bytes` and `crc32c`), so it has a fixed encoded size.
//!
//! A [`ShardBuilder`] appends member chunk data first and seals the index last with [`ShardBuilder::finish`].
//! A shard whose index is missing or damaged fails the index checksum or its range checks, and is never silently misread.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    array::{
        chunk_grid::RegularChunkGrid,
        codec::{CodecChain, CodecError, CodecRegistry},
        ArrayIndices, ArrayShape, DataType,
    },
    array_subset::{ravel_indices, ArraySubset},
    byte_range::ByteRange,
    metadata::Metadata,
    plugin::PluginCreateError,
};

/// The identifier of the `sharding_indexed` codec.
pub const IDENTIFIER: &str = "sharding_indexed";

const CRC32C_IDENTIFIER: &str = "crc32c";

/// The location of the shard index in a shard.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShardingIndexLocation {
    /// The index is at the start of the shard, before the chunk data.
    Start,
    /// The index is at the end of the shard, after the chunk data.
    #[default]
    End,
}

/// Configuration parameters for the `sharding_indexed` codec.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShardingCodecConfiguration {
    /// The shape of the inner chunks.
    pub chunk_shape: ArrayShape,
    /// The codecs of the inner chunks.
    pub codecs: Vec<Metadata>,
    /// The codecs of the shard index.
    pub index_codecs: Vec<Metadata>,
    /// The location of the shard index.
    #[serde(default)]
    pub index_location: ShardingIndexLocation,
}

/// A sharding error.
#[derive(Debug, Error)]
pub enum ShardingError {
    /// The shard shape is not a multiple of the inner chunk shape.
    #[error("shard shape {shard_shape:?} is not a multiple of the inner chunk shape {chunk_shape:?}")]
    InvalidShardShape {
        /// The shard shape.
        shard_shape: ArrayShape,
        /// The inner chunk shape.
        chunk_shape: ArrayShape,
    },
    /// An inner chunk is outside of the shard.
    #[error("inner chunk {0:?} is outside of the shard")]
    ChunkOutOfShard(ArrayIndices),
    /// An inner chunk was appended twice.
    #[error("inner chunk {0:?} is already in the shard")]
    DuplicateChunk(ArrayIndices),
    /// The shard is too short to hold its index.
    #[error("shard of {size} bytes cannot hold an index of {index_size} bytes")]
    MissingIndex {
        /// The shard size.
        size: u64,
        /// The encoded index size.
        index_size: u64,
    },
    /// The shard index of a shard with this many inner chunks along each dimension is too large to address.
    #[error("shard index of {0:?} inner chunks is too large")]
    IndexTooLarge(ArrayShape),
    /// The encoded shard index has the wrong size.
    #[error("shard index is {got} bytes, expected {expected}")]
    IndexSize {
        /// The encoded index size.
        got: u64,
        /// The expected encoded index size.
        expected: u64,
    },
    /// The shard index could not be decoded.
    #[error("shard index is invalid: {0}")]
    InvalidIndex(#[source] CodecError),
    /// The shard index could not be encoded.
    #[error("shard index could not be encoded: {0}")]
    IndexEncode(#[source] CodecError),
    /// A shard index entry points outside of the chunk data.
    #[error("shard index entry {offset}+{nbytes} is outside of the chunk data of {size} bytes")]
    EntryOutOfBounds {
        /// The entry offset.
        offset: u64,
        /// The entry size.
        nbytes: u64,
        /// The size of the region holding chunk data.
        size: u64,
    },
}

/// The resolved parameters of a sharded array.
#[derive(Debug, Clone)]
pub struct ShardingParameters {
    inner_chunk_grid: RegularChunkGrid,
    inner_codecs: CodecChain,
    index_codecs: CodecChain,
    index_location: ShardingIndexLocation,
}

impl ShardingParameters {
    /// Create sharding parameters.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the inner chunk shape has a zero dimension,
    /// or the index codecs are not `bytes` followed by any number of `crc32c` codecs.
    pub fn new(
        chunk_shape: ArrayShape,
        inner_codecs: CodecChain,
        index_codecs: CodecChain,
        index_location: ShardingIndexLocation,
    ) -> Result<Self, PluginCreateError> {
        let fixed_size = index_codecs
            .bytes_to_bytes_codecs()
            .iter()
            .all(|codec| codec.create_metadata().name() == CRC32C_IDENTIFIER);
        if !fixed_size {
            return Err(PluginCreateError::from(
                "the shard index codecs must have a fixed encoded size",
            ));
        }
        let inner_chunk_grid =
            RegularChunkGrid::new(chunk_shape).map_err(|err| PluginCreateError::from(err.to_string()))?;
        Ok(Self {
            inner_chunk_grid,
            inner_codecs,
            index_codecs,
            index_location,
        })
    }

    /// Create sharding parameters with the default index codecs (little-endian `bytes` and `crc32c`) and index location (`end`).
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the inner chunk shape has a zero dimension.
    pub fn new_with_default_index(
        chunk_shape: ArrayShape,
        inner_codecs: CodecChain,
    ) -> Result<Self, PluginCreateError> {
        Self::new(
            chunk_shape,
            inner_codecs,
            default_index_codecs(),
            ShardingIndexLocation::End,
        )
    }

    /// Create sharding parameters from `sharding_indexed` metadata, creating codecs with `registry`.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the configuration is invalid or a codec is unsupported.
    pub fn from_metadata(metadata: &Metadata, registry: &CodecRegistry) -> Result<Self, PluginCreateError> {
        let configuration: ShardingCodecConfiguration = metadata
            .to_configuration()
            .map_err(|_| PluginCreateError::metadata_invalid(IDENTIFIER, "codec", metadata))?;
        Self::new(
            configuration.chunk_shape,
            CodecChain::from_metadata(&configuration.codecs, registry)?,
            CodecChain::from_metadata(&configuration.index_codecs, registry)?,
            configuration.index_location,
        )
    }

    /// Create the `sharding_indexed` codec metadata.
    #[must_use]
    pub fn create_metadata(&self) -> Metadata {
        crate::array::codec::codec_metadata(
            IDENTIFIER,
            &ShardingCodecConfiguration {
                chunk_shape: self.chunk_shape().to_vec(),
                codecs: self.inner_codecs.create_metadatas(),
                index_codecs: self.index_codecs.create_metadatas(),
                index_location: self.index_location,
            },
        )
    }

    /// Return the inner chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        self.inner_chunk_grid.chunk_shape()
    }

    /// Return the grid of inner chunks over an entire array.
    #[must_use]
    pub const fn inner_chunk_grid(&self) -> &RegularChunkGrid {
        &self.inner_chunk_grid
    }

    /// Return the codecs of the inner chunks.
    #[must_use]
    pub const fn inner_codecs(&self) -> &CodecChain {
        &self.inner_codecs
    }

    /// Return the codecs of the shard index.
    #[must_use]
    pub const fn index_codecs(&self) -> &CodecChain {
        &self.index_codecs
    }

    /// Return the location of the shard index.
    #[must_use]
    pub const fn index_location(&self) -> ShardingIndexLocation {
        self.index_location
    }

    /// Return the number of inner chunks along each dimension of a shard.
    ///
    /// # Errors
    /// Returns [`ShardingError::InvalidShardShape`] unless `shard_shape` is a multiple of the inner chunk shape.
    pub fn chunks_per_shard(&self, shard_shape: &[u64]) -> Result<ArrayShape, ShardingError> {
        chunks_per_shard(shard_shape, self.chunk_shape())
    }

    /// Return the encoded size of the index of a shard with `num_chunks` inner chunks.
    #[must_use]
    pub fn index_encoded_size(&self, num_chunks: usize) -> u64 {
        let crc32c_codecs = self.index_codecs.bytes_to_bytes_codecs().len() as u64;
        let checksum_size = crate::array::codec::bytes_to_bytes::crc32c::CHECKSUM_SIZE as u64;
        (num_chunks as u64)
            .saturating_mul(2 * core::mem::size_of::<u64>() as u64)
            .saturating_add(crc32c_codecs * checksum_size)
    }

    /// Return the byte range of the index in a shard with `num_chunks` inner chunks.
    #[must_use]
    pub fn index_byte_range(&self, num_chunks: usize) -> ByteRange {
        let index_size = self.index_encoded_size(num_chunks);
        match self.index_location {
            ShardingIndexLocation::Start => ByteRange::FromStart(0, Some(index_size)),
            ShardingIndexLocation::End => ByteRange::FromEnd(0, Some(index_size)),
        }
    }
}

/// Return the default shard index codecs: little-endian `bytes` followed by `crc32c`.
#[must_use]
pub fn default_index_codecs() -> CodecChain {
    CodecChain::new(
        crate::array::codec::BytesCodec::new(Some(crate::array::Endianness::Little)),
        vec![crate::array::codec::Codec::new(
            crate::array::codec::Crc32cCodec::new(),
        )],
    )
}

/// Return the number of inner chunks along each dimension of a shard.
///
/// # Errors
/// Returns [`ShardingError::InvalidShardShape`] unless `shard_shape` is a non-zero multiple of `chunk_shape`.
pub fn chunks_per_shard(shard_shape: &[u64], chunk_shape: &[u64]) -> Result<ArrayShape, ShardingError> {
    let invalid = || ShardingError::InvalidShardShape {
        shard_shape: shard_shape.to_vec(),
        chunk_shape: chunk_shape.to_vec(),
    };
    if shard_shape.len() != chunk_shape.len() {
        return Err(invalid());
    }
    std::iter::zip(shard_shape, chunk_shape)
        .map(|(&s, &c)| {
            if s > 0 && c > 0 && num::Integer::is_multiple_of(&s, &c) {
                Ok(s / c)
            } else {
                Err(invalid())
            }
        })
        .collect()
}

/// Return the number of `u64` entries in the index of a shard with `chunks_per_shard` inner chunks.
fn index_entries(chunks_per_shard: &[u64]) -> Result<usize, ShardingError> {
    chunks_per_shard
        .iter()
        .try_fold(2u64, |entries, &n| entries.checked_mul(n))
        .filter(|entries| entries.checked_mul(core::mem::size_of::<u64>() as u64).is_some())
        .and_then(|entries| usize::try_from(entries).ok())
        .ok_or_else(|| ShardingError::IndexTooLarge(chunks_per_shard.to_vec()))
}

/// A shard index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardIndex {
    chunks_per_shard: ArrayShape,
    entries: Vec<u64>,
}

impl ShardIndex {
    /// Create an index with every inner chunk of a shard with `chunks_per_shard` empty.
    ///
    /// # Errors
    /// Returns [`ShardingError::IndexTooLarge`] if the index cannot be addressed.
    pub fn new_empty(chunks_per_shard: ArrayShape) -> Result<Self, ShardingError> {
        let entries = vec![u64::MAX; index_entries(&chunks_per_shard)?];
        Ok(Self {
            chunks_per_shard,
            entries,
        })
    }

    /// Return the number of inner chunks along each dimension.
    #[must_use]
    pub fn chunks_per_shard(&self) -> &[u64] {
        &self.chunks_per_shard
    }

    /// Return the number of inner chunks.
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.entries.len() / 2
    }

    fn position(&self, chunk_indices: &[u64]) -> Result<usize, ShardingError> {
        let inbounds = chunk_indices.len() == self.chunks_per_shard.len()
            && std::iter::zip(chunk_indices, &self.chunks_per_shard).all(|(i, n)| i < n);
        if inbounds {
            let position = ravel_indices(chunk_indices, &self.chunks_per_shard);
            usize::try_from(position)
                .map_err(|_| ShardingError::ChunkOutOfShard(chunk_indices.to_vec()))
        } else {
            Err(ShardingError::ChunkOutOfShard(chunk_indices.to_vec()))
        }
    }

    /// Return the `(offset, nbytes)` of the inner chunk at `chunk_indices`, or [`None`] if it is empty.
    ///
    /// # Errors
    /// Returns [`ShardingError::ChunkOutOfShard`] if `chunk_indices` is outside of the shard.
    pub fn get(&self, chunk_indices: &[u64]) -> Result<Option<(u64, u64)>, ShardingError> {
        let position = self.position(chunk_indices)?;
        let offset = self.entries[position * 2];
        let nbytes = self.entries[position * 2 + 1];
        Ok((offset != u64::MAX || nbytes != u64::MAX).then_some((offset, nbytes)))
    }

    fn set(&mut self, chunk_indices: &[u64], offset: u64, nbytes: u64) -> Result<(), ShardingError> {
        let position = self.position(chunk_indices)?;
        self.entries[position * 2] = offset;
        self.entries[position * 2 + 1] = nbytes;
        Ok(())
    }

    /// Return the indices of the inner chunks present in the shard, in row-major order.
    #[must_use]
    pub fn present_chunks(&self) -> Vec<ArrayIndices> {
        ArraySubset::new_with_shape(self.chunks_per_shard.clone())
            .indices()
            .filter(|indices| matches!(self.get(indices), Ok(Some(_))))
            .collect()
    }

    /// Check that every entry lies within `data_size` bytes of chunk data starting at `data_offset`.
    ///
    /// # Errors
    /// Returns [`ShardingError::EntryOutOfBounds`] for the first entry outside of the chunk data.
    pub fn validate(&self, data_offset: u64, data_size: u64) -> Result<(), ShardingError> {
        for entry in self.entries.chunks_exact(2) {
            let (offset, nbytes) = (entry[0], entry[1]);
            if offset == u64::MAX && nbytes == u64::MAX {
                continue;
            }
            let inbounds = offset >= data_offset
                && offset
                    .checked_add(nbytes)
                    .is_some_and(|end| end <= data_offset + data_size);
            if !inbounds {
                return Err(ShardingError::EntryOutOfBounds {
                    offset,
                    nbytes,
                    size: data_size,
                });
            }
        }
        Ok(())
    }

    /// Encode the index with `index_codecs`.
    ///
    /// # Errors
    /// Returns [`ShardingError::IndexEncode`] if an index codec fails.
    pub fn encode(&self, index_codecs: &CodecChain) -> Result<Vec<u8>, ShardingError> {
        let bytes = bytemuck::cast_slice::<u64, u8>(&self.entries).to_vec();
        index_codecs
            .encode(bytes, DataType::UInt64)
            .map_err(ShardingError::IndexEncode)
    }

    /// Decode an index of a shard with `chunks_per_shard` from `encoded` with `index_codecs`.
    ///
    /// # Errors
    /// Returns [`ShardingError::IndexTooLarge`] if the index cannot be addressed,
    /// or [`ShardingError::InvalidIndex`] if the index does not decode (e.g. its checksum is wrong) or has the wrong size.
    pub fn decode(
        encoded: &[u8],
        chunks_per_shard: ArrayShape,
        index_codecs: &CodecChain,
    ) -> Result<Self, ShardingError> {
        let expected = index_entries(&chunks_per_shard)? * core::mem::size_of::<u64>();
        let decoded = index_codecs
            .decode(encoded.to_vec(), DataType::UInt64)
            .map_err(ShardingError::InvalidIndex)?;
        if decoded.len() != expected {
            return Err(ShardingError::InvalidIndex(
                CodecError::UnexpectedDecodedSize {
                    got: decoded.len(),
                    expected,
                },
            ));
        }
        Ok(Self {
            chunks_per_shard,
            entries: bytemuck::allocation::pod_collect_to_vec(&decoded),
        })
    }
}

/// Builds a shard by appending encoded inner chunks and then sealing the index.
#[derive(Debug)]
pub struct ShardBuilder {
    index: ShardIndex,
    data: Vec<u8>,
}

impl ShardBuilder {
    /// Create a builder for a shard with `chunks_per_shard` inner chunks.
    ///
    /// # Errors
    /// Returns [`ShardingError::IndexTooLarge`] if the shard index cannot be addressed.
    pub fn new(chunks_per_shard: ArrayShape) -> Result<Self, ShardingError> {
        Ok(Self {
            index: ShardIndex::new_empty(chunks_per_shard)?,
            data: Vec::new(),
        })
    }

    /// Append the encoded inner chunk at `chunk_indices` (relative to the shard).
    ///
    /// # Errors
    /// Returns [`ShardingError`] if the chunk is outside of the shard or was already appended.
    pub fn append(&mut self, chunk_indices: &[u64], encoded_chunk: &[u8]) -> Result<(), ShardingError> {
        if self.index.get(chunk_indices)?.is_some() {
            return Err(ShardingError::DuplicateChunk(chunk_indices.to_vec()));
        }
        self.index
            .set(chunk_indices, self.data.len() as u64, encoded_chunk.len() as u64)?;
        self.data.extend_from_slice(encoded_chunk);
        Ok(())
    }

    /// Return the number of appended inner chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.present_chunks().len()
    }

    /// Return true if no inner chunks were appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.len() == 0
    }

    /// Seal the shard, returning the shard bytes and its index.
    ///
    /// With the index at the end, the shard is the chunk data followed by the encoded index.
    /// With the index at the start, the offsets are shifted past the encoded index.
    ///
    /// # Errors
    /// Returns [`ShardingError::IndexEncode`] if an index codec fails.
    pub fn finish(
        self,
        index_codecs: &CodecChain,
        index_location: ShardingIndexLocation,
    ) -> Result<(Vec<u8>, ShardIndex), ShardingError> {
        let Self { mut index, data } = self;
        match index_location {
            ShardingIndexLocation::End => {
                let encoded_index = index.encode(index_codecs)?;
                let mut shard = data;
                shard.extend_from_slice(&encoded_index);
                Ok((shard, index))
            }
            ShardingIndexLocation::Start => {
                let index_size = index.encode(index_codecs)?.len() as u64;
                for entry in index.entries.chunks_exact_mut(2) {
                    if entry[0] != u64::MAX {
                        entry[0] += index_size;
                    }
                }
                let mut shard = index.encode(index_codecs)?;
                shard.extend_from_slice(&data);
                Ok((shard, index))
            }
        }
    }
}

/// Pack encoded inner chunks into a shard with the index at the end.
///
/// `chunks` holds each present inner chunk's indices (relative to the shard) and encoded bytes.
///
/// # Errors
/// Returns [`ShardingError`] if a chunk is outside of the shard, is repeated, or the index cannot be encoded.
pub fn pack_shard<'a>(
    chunks_per_shard: ArrayShape,
    chunks: impl IntoIterator<Item = (&'a [u64], &'a [u8])>,
    index_codecs: &CodecChain,
) -> Result<(Vec<u8>, ShardIndex), ShardingError> {
    let mut builder = ShardBuilder::new(chunks_per_shard)?;
    for (chunk_indices, encoded_chunk) in chunks {
        builder.append(chunk_indices, encoded_chunk)?;
    }
    builder.finish(index_codecs, ShardingIndexLocation::End)
}

/// Return the encoded inner chunk at `chunk_indices` from `shard`, or [`None`] if it is not present.
///
/// # Errors
/// Returns [`ShardingError`] if the chunk is outside of the shard or its index entry is outside of `shard`.
pub fn unpack_shard_chunk<'a>(
    shard: &'a [u8],
    index: &ShardIndex,
    chunk_indices: &[u64],
) -> Result<Option<&'a [u8]>, ShardingError> {
    let Some((offset, nbytes)) = index.get(chunk_indices)? else {
        return Ok(None);
    };
    let out_of_bounds = || ShardingError::EntryOutOfBounds {
        offset,
        nbytes,
        size: shard.len() as u64,
    };
    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let end = offset
        .checked_add(nbytes)
        .and_then(|end| usize::try_from(end).ok())
        .ok_or_else(out_of_bounds)?;
    shard.get(start..end).map(Some).ok_or_else(out_of_bounds)
}

/// Decode the index of a complete `shard`.
///
/// # Errors
/// Returns [`ShardingError`] if the shard cannot hold an index, the index is invalid, or an entry is outside of the chunk data.
pub fn decode_shard_index(
    shard: &[u8],
    chunks_per_shard: ArrayShape,
    parameters: &ShardingParameters,
) -> Result<ShardIndex, ShardingError> {
    let num_chunks = index_entries(&chunks_per_shard)? / 2;
    let size = shard.len() as u64;
    let encoded_index = parameters
        .index_byte_range(num_chunks)
        .to_range(size)
        .map_or(&[][..], |range| &shard[range]);
    decode_shard_index_of_size(encoded_index, size, chunks_per_shard, parameters)
}

/// Decode `encoded_index`, the index read from a shard of `shard_size` bytes.
///
/// # Errors
/// Returns [`ShardingError`] if the shard cannot hold an index, the index is invalid, or an entry is outside of the chunk data.
pub fn decode_shard_index_of_size(
    encoded_index: &[u8],
    shard_size: u64,
    chunks_per_shard: ArrayShape,
    parameters: &ShardingParameters,
) -> Result<ShardIndex, ShardingError> {
    let num_chunks = index_entries(&chunks_per_shard)? / 2;
    let index_size = parameters.index_encoded_size(num_chunks);
    if shard_size < index_size {
        return Err(ShardingError::MissingIndex {
            size: shard_size,
            index_size,
        });
    }
    if encoded_index.len() as u64 != index_size {
        return Err(ShardingError::IndexSize {
            got: encoded_index.len() as u64,
            expected: index_size,
        });
    }
    let data_offset = match parameters.index_location() {
        ShardingIndexLocation::Start => index_size,
        ShardingIndexLocation::End => 0,
    };
    let index = ShardIndex::decode(encoded_index, chunks_per_shard, parameters.index_codecs())?;
    index.validate(data_offset, shard_size - index_size)?;
    Ok(index)
}
