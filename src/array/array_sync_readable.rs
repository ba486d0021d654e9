use std::collections::BTreeMap;

use crate::{
    array_subset::{copy_region, ArraySubset},
    metadata::{ContainerFormat, NodeType},
    storage::{
        node_metadata_name, ListableStorageTraits, ReadableStorageTraits, StorePrefix, StoreKey,
    },
};

use super::{
    map_chunks,
    n5_block::{N5BlockHeader, N5BlockMode},
    sharding::{decode_shard_index, unpack_shard_chunk},
    Array, ArrayCodecs, ArrayError, ArrayIndices, ChunkReadFailure, CodecChain, ReadOptions,
    ShardingParameters,
};

/// The bytes of a region read from an array, with any chunks that could not be read.
#[derive(Debug)]
pub struct ArrayRead {
    /// The row-major bytes of the region.
    ///
    /// Elements of missing or failed chunks hold the fill value.
    pub bytes: Vec<u8>,
    /// The chunks that could not be read.
    pub failures: Vec<ChunkReadFailure>,
}

impl ArrayRead {
    /// Returns true if every chunk of the region was read.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A decoded chunk (or inner chunk of a shard) and the region of the array it covers.
struct ChunkPart {
    chunk_indices: ArrayIndices,
    chunk_subset: ArraySubset,
    bytes: Result<Option<Vec<u8>>, ArrayError>,
}

impl<TStorage: ?Sized + ReadableStorageTraits> Array<TStorage> {
    /// Read `region` of the array with the default [`ReadOptions`].
    ///
    /// See [`read_opt`](Array::read_opt).
    ///
    /// # Errors
    /// See [`read_opt`](Array::read_opt).
    pub fn read(&self, region: &ArraySubset) -> Result<ArrayRead, ArrayError> {
        self.read_opt(region, &ReadOptions::default())
    }

    /// Read `region` of the array.
    ///
    /// Elements of chunks that do not exist in the store hold the fill value.
    /// A chunk that exists but cannot be retrieved or decoded is reported in [`ArrayRead::failures`] and its elements hold the fill value,
    /// unless `options` are strict, in which case the first failure is returned as an error.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidArraySubset`] if `region` is not within the array,
    /// or the error of a failed chunk if `options` are strict.
    pub fn read_opt(&self, region: &ArraySubset, options: &ReadOptions) -> Result<ArrayRead, ArrayError> {
        if !region.inbounds(&self.shape) {
            return Err(ArrayError::InvalidArraySubset(
                region.clone(),
                self.shape.clone(),
            ));
        }
        let parts = match &self.codecs {
            ArrayCodecs::Chain(codecs) => self.read_chunk_parts(region, codecs, options)?,
            ArrayCodecs::Sharding(sharding) => self.read_shard_parts(region, sharding, options)?,
        };

        let element_size = self.data_type.size();
        let mut bytes = self.fill_value.repeat(region.num_elements_usize());
        let mut failures = Vec::new();
        for ChunkPart {
            chunk_indices,
            chunk_subset,
            bytes: chunk_bytes,
        } in parts
        {
            match chunk_bytes {
                Ok(Some(chunk_bytes)) => {
                    let overlap = chunk_subset.overlap(region)?;
                    copy_region(
                        &chunk_bytes,
                        chunk_subset.shape(),
                        &overlap.relative_to(chunk_subset.start())?,
                        &mut bytes,
                        region.shape(),
                        &overlap.relative_to(region.start())?,
                        element_size,
                    )?;
                }
                Ok(None) => {}
                Err(error) => {
                    if options.strict() {
                        return Err(error);
                    }
                    log::warn!(
                        "failed to read chunk {chunk_indices:?} of array {}: {error}",
                        self.path
                    );
                    failures.push(ChunkReadFailure {
                        chunk_indices,
                        error,
                    });
                }
            }
        }
        Ok(ArrayRead { bytes, failures })
    }

    /// Read `region` of the array, failing on the first chunk that cannot be read.
    ///
    /// # Errors
    /// Returns [`ArrayError`] if `region` is not within the array or a chunk cannot be retrieved or decoded.
    pub fn retrieve_array_subset(&self, region: &ArraySubset) -> Result<Vec<u8>, ArrayError> {
        let options = ReadOptions::default().with_strict(true);
        Ok(self.read_opt(region, &options)?.bytes)
    }

    /// Read `region` of the array as elements, failing on the first chunk that cannot be read.
    ///
    /// # Errors
    /// Returns [`ArrayError::IncompatibleElementSize`] if the size of `T` does not match the data type,
    /// or an error under the same conditions as [`retrieve_array_subset`](Array::retrieve_array_subset).
    pub fn retrieve_array_subset_elements<T: bytemuck::Pod>(
        &self,
        region: &ArraySubset,
    ) -> Result<Vec<T>, ArrayError> {
        self.validate_element_size::<T>()?;
        let bytes = self.retrieve_array_subset(region)?;
        Ok(bytemuck::allocation::pod_collect_to_vec(&bytes))
    }

    #[cfg(feature = "ndarray")]
    /// Read `region` of the array as an [`ndarray::ArrayD`], failing on the first chunk that cannot be read.
    ///
    /// # Errors
    /// See [`retrieve_array_subset_elements`](Array::retrieve_array_subset_elements).
    pub fn retrieve_array_subset_ndarray<T: bytemuck::Pod>(
        &self,
        region: &ArraySubset,
    ) -> Result<ndarray::ArrayD<T>, ArrayError> {
        let elements = self.retrieve_array_subset_elements(region)?;
        super::elements_to_ndarray(region.shape(), elements)
    }

    /// Read the chunk at `chunk_indices`, truncated to the array bounds.
    ///
    /// The elements of a missing chunk hold the fill value.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidChunkGridIndices`] if `chunk_indices` are outside of the chunk grid,
    /// or an error if the chunk cannot be retrieved or decoded.
    pub fn retrieve_chunk(&self, chunk_indices: &[u64]) -> Result<Vec<u8>, ArrayError> {
        let chunk_subset = self.chunk_subset(chunk_indices)?;
        self.retrieve_array_subset(&chunk_subset)
    }

    /// Read the chunk at `chunk_indices` as elements.
    ///
    /// # Errors
    /// See [`retrieve_chunk`](Array::retrieve_chunk) and [`retrieve_array_subset_elements`](Array::retrieve_array_subset_elements).
    pub fn retrieve_chunk_elements<T: bytemuck::Pod>(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Vec<T>, ArrayError> {
        let chunk_subset = self.chunk_subset(chunk_indices)?;
        self.retrieve_array_subset_elements(&chunk_subset)
    }

    fn read_chunk_parts(
        &self,
        region: &ArraySubset,
        codecs: &CodecChain,
        options: &ReadOptions,
    ) -> Result<Vec<ChunkPart>, ArrayError> {
        let chunks = self
            .chunk_grid
            .chunks_in_array_subset(region)?
            .indices()
            .map(|chunk_indices| {
                let chunk_subset = self.chunk_subset(&chunk_indices)?;
                Ok((chunk_indices, chunk_subset))
            })
            .collect::<Result<Vec<_>, ArrayError>>()?;
        Ok(map_chunks(
            chunks,
            options.parallel(),
            |(chunk_indices, chunk_subset)| {
                let bytes = self.retrieve_decoded_chunk(codecs, &chunk_indices, &chunk_subset);
                ChunkPart {
                    chunk_indices,
                    chunk_subset,
                    bytes,
                }
            },
        ))
    }

    fn retrieve_decoded_chunk(
        &self,
        codecs: &CodecChain,
        chunk_indices: &[u64],
        chunk_subset: &ArraySubset,
    ) -> Result<Option<Vec<u8>>, ArrayError> {
        let key = self.chunk_key(chunk_indices);
        log::trace!("reading chunk {key}");
        let Some(encoded) = self.storage.get(&key)? else {
            return Ok(None);
        };
        self.decode_chunk(
            codecs,
            &key,
            encoded.to_vec(),
            chunk_subset.shape(),
            self.chunk_grid.chunk_shape(),
        )
        .map(Some)
    }

    /// Decode a stored chunk covering `chunk_shape` elements of a chunk grid with `full_shape` chunks.
    ///
    /// The decoded chunk may hold either the truncated or the full (padded) chunk.
    fn decode_chunk(
        &self,
        codecs: &CodecChain,
        key: &StoreKey,
        encoded: Vec<u8>,
        chunk_shape: &[u64],
        full_shape: &[u64],
    ) -> Result<Vec<u8>, ArrayError> {
        let corrupt = |reason: String| ArrayError::CorruptChunk {
            key: key.clone(),
            reason,
        };
        let encoded = if self.format == ContainerFormat::N5 {
            let (header, payload) =
                N5BlockHeader::parse(&encoded).map_err(|err| corrupt(err.to_string()))?;
            if header.shape() != chunk_shape && header.shape() != full_shape {
                return Err(corrupt(format!(
                    "block shape {:?} does not match chunk shape {chunk_shape:?}",
                    header.shape()
                )));
            }
            if let N5BlockMode::VarLength { num_elements } = header.mode() {
                if u64::from(num_elements) != header.shape().iter().product::<u64>() {
                    return Err(corrupt(format!(
                        "varlength block with {num_elements} elements is not supported"
                    )));
                }
            }
            payload.to_vec()
        } else {
            encoded
        };
        let decoded = codecs
            .decode(encoded, self.data_type)
            .map_err(|err| corrupt(err.to_string()))?;

        let element_size = self.data_type.size();
        let truncated_size = chunk_shape.iter().product::<u64>() * element_size as u64;
        let full_size = full_shape.iter().product::<u64>() * element_size as u64;
        let decoded_size = decoded.len() as u64;
        if decoded_size == truncated_size {
            Ok(decoded)
        } else if decoded_size == full_size {
            Ok(ArraySubset::new_with_shape(chunk_shape.to_vec()).extract_bytes(
                &decoded,
                full_shape,
                element_size,
            )?)
        } else {
            Err(corrupt(format!(
                "decoded {decoded_size} bytes, expected {truncated_size} or {full_size}"
            )))
        }
    }

    fn read_shard_parts(
        &self,
        region: &ArraySubset,
        sharding: &ShardingParameters,
        options: &ReadOptions,
    ) -> Result<Vec<ChunkPart>, ArrayError> {
        let chunks_per_shard = sharding.chunks_per_shard(self.chunk_grid.chunk_shape())?;
        let inner_chunk_grid = sharding.inner_chunk_grid();
        let mut shards: BTreeMap<ArrayIndices, Vec<(ArrayIndices, ArraySubset)>> = BTreeMap::new();
        for chunk_indices in inner_chunk_grid.chunks_in_array_subset(region)?.indices() {
            let Some(chunk_subset) = inner_chunk_grid.chunk_subset(&chunk_indices, &self.shape)? else {
                continue;
            };
            let shard_indices = std::iter::zip(&chunk_indices, &chunks_per_shard)
                .map(|(i, c)| i / c)
                .collect();
            shards
                .entry(shard_indices)
                .or_default()
                .push((chunk_indices, chunk_subset));
        }
        let shards: Vec<_> = shards.into_iter().collect();
        let parts = map_chunks(shards, options.parallel(), |(shard_indices, members)| {
            self.read_shard_members(sharding, &chunks_per_shard, &shard_indices, members)
        });
        Ok(parts.into_iter().flatten().collect())
    }

    /// Read the inner chunks `members` of the shard at `shard_indices`.
    ///
    /// The shard is retrieved with a single `get`, so its index and chunk data come from the same stored value.
    /// A shard that cannot be read fails every member.
    fn read_shard_members(
        &self,
        sharding: &ShardingParameters,
        chunks_per_shard: &[u64],
        shard_indices: &[u64],
        members: Vec<(ArrayIndices, ArraySubset)>,
    ) -> Vec<ChunkPart> {
        let key = self.chunk_key(shard_indices);
        log::trace!("reading shard {key}");
        let shard = match self.storage.get(&key) {
            Ok(Some(shard)) => shard,
            Ok(None) => return with_result(members, |_| Ok(None)),
            Err(err) => {
                let err = ArrayError::from(err);
                return with_result(members, |_| Err(err.for_member(&key)));
            }
        };
        let index = match decode_shard_index(&shard, chunks_per_shard.to_vec(), sharding) {
            Ok(index) => index,
            Err(err) => {
                let err = ArrayError::CorruptShard {
                    key: key.clone(),
                    reason: err.to_string(),
                };
                return with_result(members, |_| Err(err.for_member(&key)));
            }
        };

        let shard_origin: ArrayIndices = std::iter::zip(shard_indices, chunks_per_shard)
            .map(|(i, c)| i * c)
            .collect();
        members
            .into_iter()
            .map(|(chunk_indices, chunk_subset)| {
                let indices_in_shard: ArrayIndices = std::iter::zip(&chunk_indices, &shard_origin)
                    .map(|(i, o)| i - o)
                    .collect();
                let bytes = match unpack_shard_chunk(&shard, &index, &indices_in_shard) {
                    Ok(Some(encoded)) => self
                        .decode_chunk(
                            sharding.inner_codecs(),
                            &key,
                            encoded.to_vec(),
                            chunk_subset.shape(),
                            sharding.chunk_shape(),
                        )
                        .map(Some),
                    Ok(None) => Ok(None),
                    Err(err) => Err(err.into()),
                };
                ChunkPart {
                    chunk_indices,
                    chunk_subset,
                    bytes,
                }
            })
            .collect()
    }
}

impl<TStorage: ?Sized + ListableStorageTraits> Array<TStorage> {
    /// Return the grid indices of every chunk (or shard) stored for the array.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidKey`] if a key under the array is not a chunk key of its chunk key encoding,
    /// or [`ArrayError::StorageError`] if the store cannot be listed.
    pub fn stored_chunks(&self) -> Result<Vec<ArrayIndices>, ArrayError> {
        let prefix = StorePrefix::from(&self.path);
        let metadata_names = [
            node_metadata_name(self.format, NodeType::Array),
            ".zattrs",
        ];
        let mut chunks = Vec::new();
        for key in self.storage.list_prefix(&prefix)? {
            let Some(chunk_key) = key.strip_prefix(&prefix) else {
                continue;
            };
            if metadata_names.contains(&chunk_key) {
                continue;
            }
            chunks.push(
                self.chunk_key_encoding
                    .decode(chunk_key, self.dimensionality())?,
            );
        }
        Ok(chunks)
    }
}

fn with_result(
    members: Vec<(ArrayIndices, ArraySubset)>,
    result: impl Fn(&ArrayIndices) -> Result<Option<Vec<u8>>, ArrayError>,
) -> Vec<ChunkPart> {
    members
        .into_iter()
        .map(|(chunk_indices, chunk_subset)| ChunkPart {
            bytes: result(&chunk_indices),
            chunk_indices,
            chunk_subset,
        })
        .collect()
}
