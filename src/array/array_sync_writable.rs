use crate::{
    array_subset::ArraySubset,
    metadata::{ArrayMetadata, ContainerFormat, NodeType},
    storage::{
        node_metadata_key, store_metadata_json, zattrs_key, ReadableWritableStorageTraits,
        WritableStorageTraits,
    },
};

use super::{
    map_chunks, n5_block::N5BlockHeader, sharding::ShardBuilder, Array, ArrayCodecs,
    ArrayCreateError, ArrayError, ArrayIndices, WriteOptions,
};

impl<TStorage: ?Sized + ReadableWritableStorageTraits> Array<TStorage> {
    /// Store the metadata of the array in its container format.
    ///
    /// Storing an N5 array also marks the root of the container with the N5 version.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if the array cannot be expressed in its container format or there is a storage error.
    pub fn store_metadata(&self) -> Result<(), ArrayCreateError> {
        let key = node_metadata_key(&self.path, self.format, NodeType::Array);
        match self.metadata()? {
            ArrayMetadata::V3(metadata) => store_metadata_json(&*self.storage, &key, &metadata)?,
            ArrayMetadata::V2(metadata) => {
                store_metadata_json(&*self.storage, &key, &metadata)?;
                if !metadata.attributes.is_empty() {
                    store_metadata_json(&*self.storage, &zattrs_key(&self.path), &metadata.attributes)?;
                }
            }
            ArrayMetadata::N5(metadata) => {
                store_metadata_json(&*self.storage, &key, &metadata)?;
                if !self.path.is_root() {
                    crate::group::ensure_n5_root(&*self.storage)?;
                }
            }
        }
        log::debug!("stored {} array metadata at {key}", self.format);
        Ok(())
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> Array<TStorage> {
    /// Write the entire array with the default [`WriteOptions`].
    ///
    /// See [`write_opt`](Array::write_opt).
    ///
    /// # Errors
    /// See [`write_opt`](Array::write_opt).
    pub fn write(&self, shape: &[u64], bytes: &[u8]) -> Result<(), ArrayError> {
        self.write_opt(shape, bytes, &WriteOptions::default())
    }

    /// Write the entire array from `bytes`, the row-major bytes of an array of `shape`.
    ///
    /// Every chunk is encoded before any chunk is stored, so an encoding failure leaves the store untouched.
    /// Each chunk is stored with a single `set`.
    ///
    /// # Errors
    /// Returns [`ArrayError::ShapeMismatch`] if `shape` is not the array shape,
    /// [`ArrayError::InvalidBytesInputSize`] if `bytes` has the wrong length,
    /// or an error if a chunk cannot be encoded or stored.
    pub fn write_opt(
        &self,
        shape: &[u64],
        bytes: &[u8],
        options: &WriteOptions,
    ) -> Result<(), ArrayError> {
        if shape != self.shape.as_slice() {
            return Err(ArrayError::ShapeMismatch {
                got: shape.to_vec(),
                expected: self.shape.clone(),
            });
        }
        let element_size = self.data_type.size();
        let expected_size = self.subset_all().num_elements() * element_size as u64;
        if bytes.len() as u64 != expected_size {
            return Err(ArrayError::InvalidBytesInputSize(bytes.len(), expected_size));
        }

        let chunks: Vec<ArrayIndices> = ArraySubset::new_with_shape(self.chunk_grid_shape())
            .indices()
            .collect();
        let encoded_chunks = map_chunks(
            chunks,
            options.parallel(),
            |chunk_indices| -> Result<(ArrayIndices, Vec<u8>), ArrayError> {
                let chunk_subset = self.chunk_subset(&chunk_indices)?;
                let chunk_bytes = chunk_subset.extract_bytes(bytes, &self.shape, element_size)?;
                let encoded = self.encode_chunk(&chunk_subset, chunk_bytes)?;
                Ok((chunk_indices, encoded))
            },
        )
        .into_iter()
        .collect::<Result<Vec<_>, ArrayError>>()?;

        for (chunk_indices, encoded) in encoded_chunks {
            let key = self.chunk_key(&chunk_indices);
            log::debug!("writing chunk {key} ({} bytes)", encoded.len());
            self.storage.set(&key, encoded.into())?;
        }
        Ok(())
    }

    /// Write the entire array from `elements`, in row-major order.
    ///
    /// # Errors
    /// Returns [`ArrayError::IncompatibleElementSize`] if the size of `T` does not match the data type,
    /// or an error under the same conditions as [`write`](Array::write).
    pub fn store_array_elements<T: bytemuck::Pod>(
        &self,
        shape: &[u64],
        elements: &[T],
    ) -> Result<(), ArrayError> {
        self.validate_element_size::<T>()?;
        self.write(shape, bytemuck::cast_slice(elements))
    }

    #[cfg(feature = "ndarray")]
    /// Write the entire array from an [`ndarray::ArrayViewD`].
    ///
    /// Elements are written in the logical order of `array`, whatever its memory layout.
    ///
    /// # Errors
    /// See [`store_array_elements`](Array::store_array_elements).
    pub fn store_array_ndarray<T: bytemuck::Pod>(
        &self,
        array: &ndarray::ArrayViewD<T>,
    ) -> Result<(), ArrayError> {
        let shape: Vec<u64> = array.shape().iter().map(|&size| size as u64).collect();
        let elements: Vec<T> = array.iter().copied().collect();
        self.store_array_elements(&shape, &elements)
    }

    /// Encode and store the chunk at `chunk_indices` from `chunk_bytes`, the row-major bytes of the chunk truncated to the array bounds.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidChunkGridIndices`] if `chunk_indices` are outside of the chunk grid,
    /// [`ArrayError::InvalidBytesInputSize`] if `chunk_bytes` has the wrong length,
    /// or an error if the chunk cannot be encoded or stored.
    pub fn store_chunk(&self, chunk_indices: &[u64], chunk_bytes: &[u8]) -> Result<(), ArrayError> {
        let chunk_subset = self.chunk_subset(chunk_indices)?;
        let expected_size = chunk_subset.num_elements() * self.data_type.size() as u64;
        if chunk_bytes.len() as u64 != expected_size {
            return Err(ArrayError::InvalidBytesInputSize(
                chunk_bytes.len(),
                expected_size,
            ));
        }
        let encoded = self.encode_chunk(&chunk_subset, chunk_bytes.to_vec())?;
        let key = self.chunk_key(chunk_indices);
        log::debug!("writing chunk {key} ({} bytes)", encoded.len());
        Ok(self.storage.set(&key, encoded.into())?)
    }

    /// Encode and store the chunk at `chunk_indices` from `chunk_elements`.
    ///
    /// # Errors
    /// Returns [`ArrayError::IncompatibleElementSize`] if the size of `T` does not match the data type,
    /// or an error under the same conditions as [`store_chunk`](Array::store_chunk).
    pub fn store_chunk_elements<T: bytemuck::Pod>(
        &self,
        chunk_indices: &[u64],
        chunk_elements: &[T],
    ) -> Result<(), ArrayError> {
        self.validate_element_size::<T>()?;
        self.store_chunk(chunk_indices, bytemuck::cast_slice(chunk_elements))
    }

    /// Erase the chunk at `chunk_indices`, so that its elements read as the fill value.
    ///
    /// # Errors
    /// Returns [`ArrayError::StorageError`] if there is an underlying store error.
    pub fn erase_chunk(&self, chunk_indices: &[u64]) -> Result<(), ArrayError> {
        Ok(self.storage.erase(&self.chunk_key(chunk_indices))?)
    }
}

impl<TStorage: ?Sized> Array<TStorage> {
    /// Encode the bytes of the chunk covering `chunk_subset` of the array.
    fn encode_chunk(&self, chunk_subset: &ArraySubset, chunk_bytes: Vec<u8>) -> Result<Vec<u8>, ArrayError> {
        match &self.codecs {
            ArrayCodecs::Chain(codecs) => {
                let encoded = codecs.encode(chunk_bytes, self.data_type)?;
                if self.format == ContainerFormat::N5 {
                    Ok(N5BlockHeader::new(chunk_subset.shape().to_vec()).encode(&encoded)?)
                } else {
                    Ok(encoded)
                }
            }
            ArrayCodecs::Sharding(sharding) => {
                let element_size = self.data_type.size();
                let chunks_per_shard = sharding.chunks_per_shard(self.chunk_grid.chunk_shape())?;
                let inner_chunk_grid = sharding.inner_chunk_grid();
                let shard_origin = inner_chunk_grid.chunk_indices_of(chunk_subset.start())?;
                let mut builder = ShardBuilder::new(chunks_per_shard.clone())?;
                for indices_in_shard in ArraySubset::new_with_shape(chunks_per_shard).indices() {
                    let chunk_indices: ArrayIndices = std::iter::zip(&indices_in_shard, &shard_origin)
                        .map(|(i, o)| i + o)
                        .collect();
                    let Some(inner_subset) = inner_chunk_grid.chunk_subset(&chunk_indices, &self.shape)?
                    else {
                        continue;
                    };
                    let inner_bytes = inner_subset
                        .relative_to(chunk_subset.start())?
                        .extract_bytes(&chunk_bytes, chunk_subset.shape(), element_size)?;
                    let encoded = sharding.inner_codecs().encode(inner_bytes, self.data_type)?;
                    builder.append(&indices_in_shard, &encoded)?;
                }
                let (shard, _) = builder.finish(sharding.index_codecs(), sharding.index_location())?;
                Ok(shard)
            }
        }
    }
}
