//! Chunked arrays.
//!
//! An array is a node in a hierarchy holding N-dimensional data of a fixed-width [`DataType`].
//! The array is partitioned by a [`RegularChunkGrid`] into chunks, and every chunk is encoded independently and stored under the key produced by its [`ChunkKeyEncoding`].
//!
//! Use [`ArrayBuilder`] (or [`create_dataset`]) to set up a new array, or [`Array::open`] (or [`open_dataset`]) for an existing array.
//! The documentation for [`Array`] details how to interact with arrays.

mod array_builder;
mod array_errors;
mod array_metadata;
mod array_sync_readable;
mod array_sync_writable;
pub mod chunk_grid;
pub mod chunk_key_encoding;
pub mod codec;
pub mod data_type;
mod endianness;
mod fill_value;
pub mod n5_block;
mod options;
pub mod sharding;

use std::sync::Arc;

use rayon::iter::{IntoParallelIterator, ParallelIterator};

pub use self::{
    array_builder::ArrayBuilder,
    array_errors::{ArrayCreateError, ArrayError, ChunkReadFailure},
    array_metadata::retrieve_array_metadata,
    array_sync_readable::ArrayRead,
    chunk_grid::RegularChunkGrid,
    chunk_key_encoding::{ChunkKeyEncoding, ChunkKeyLayout, ChunkKeySeparator},
    codec::{CodecChain, CodecRegistry},
    data_type::DataType,
    endianness::{Endianness, NATIVE_ENDIAN},
    fill_value::FillValue,
    options::{ReadOptions, WriteOptions},
    sharding::ShardingParameters,
};

use crate::{
    array_subset::ArraySubset,
    metadata::{ContainerFormat, Metadata},
    node::NodePath,
    storage::{data_key, ReadableWritableStorageTraits, StoreKey},
};

/// An ND index to an element in an array.
pub type ArrayIndices = Vec<u64>;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// The codecs of an array.
#[derive(Debug, Clone)]
pub enum ArrayCodecs {
    /// Every chunk is encoded with a codec chain and stored under its own key.
    Chain(CodecChain),
    /// Every chunk of the chunk grid is a shard of independently encoded inner chunks.
    Sharding(ShardingParameters),
}

impl ArrayCodecs {
    /// Return the codec chain applied to each stored chunk, or to each inner chunk of a shard.
    #[must_use]
    pub fn chunk_codecs(&self) -> &CodecChain {
        match self {
            Self::Chain(codecs) => codecs,
            Self::Sharding(sharding) => sharding.inner_codecs(),
        }
    }

    /// Create the Zarr V3 codec metadata.
    #[must_use]
    pub fn create_metadatas(&self) -> Vec<Metadata> {
        match self {
            Self::Chain(codecs) => codecs.create_metadatas(),
            Self::Sharding(sharding) => vec![sharding.create_metadata()],
        }
    }
}

/// A chunked array.
///
/// ### Metadata
///
/// An array is defined by the following parameters, which are encoded in the metadata document of its [`ContainerFormat`]:
///  - **shape**: the length of each array dimension,
///  - **data type**: the numerical representation of array elements,
///  - **chunk grid**: how the array is subdivided into chunks,
///  - **chunk key encoding**: how chunk grid indices are mapped to keys in a store,
///  - **fill value**: the element value of uninitialised portions of the array, and
///  - **codecs**: how chunks are encoded and decoded, optionally as shards of inner chunks,
///
/// and optional parameters:
///  - **attributes**: user-defined attributes, and
///  - **dimension names**: the names of the array dimensions (Zarr V3 only).
///
/// The metadata of an array is immutable once created.
///
/// ### Edge chunks
///
/// A chunk on the upper boundary of an array is stored truncated to the array bounds.
/// When reading, a chunk decoding to either its truncated or its full (padded) chunk shape is accepted.
/// N5 blocks carry their shape in a header.
///
/// ### Methods
///
/// Array operations are divided by the traits implemented by the backing [storage](crate::storage):
///  - [`ReadableStorageTraits`](crate::storage::ReadableStorageTraits): read array data and metadata
///    - [`read`](Array::read) / [`read_opt`](Array::read_opt)
///    - [`retrieve_array_subset`](Array::retrieve_array_subset) and [`retrieve_chunk`](Array::retrieve_chunk)
///  - [`WritableStorageTraits`](crate::storage::WritableStorageTraits): write array data and metadata
///    - [`store_metadata`](Array::store_metadata)
///    - [`write`](Array::write) / [`write_opt`](Array::write_opt)
///    - [`store_chunk`](Array::store_chunk)
///  - [`ListableStorageTraits`](crate::storage::ListableStorageTraits): enumerate stored chunks
///    - [`stored_chunks`](Array::stored_chunks)
///
/// Variants with an `_elements` suffix read and write elements of a known type.
/// With the `ndarray` feature, variants with an `_ndarray` suffix read and write [`ndarray::ArrayD`]s.
///
/// ### Concurrency
///
/// An array holds no chunk data between calls, so it can be shared between threads (e.g. in an [`Arc`]).
/// Each chunk (or shard) is written with a single store `set`, so a reader never observes a partially written chunk.
/// If a chunk is written concurrently, the last write wins.
#[derive(Debug)]
pub struct Array<TStorage: ?Sized> {
    /// The storage.
    storage: Arc<TStorage>,
    /// The path of the array in a store.
    path: NodePath,
    /// The container format of the array metadata.
    format: ContainerFormat,
    /// The length of each dimension of the array.
    shape: ArrayShape,
    /// The data type of the array.
    data_type: DataType,
    /// The chunk grid of the array.
    chunk_grid: RegularChunkGrid,
    /// The mapping from chunk grid indices to keys in the store.
    chunk_key_encoding: ChunkKeyEncoding,
    /// The element value of uninitialised portions of the array.
    fill_value: FillValue,
    /// The codecs used to encode and decode chunks.
    codecs: ArrayCodecs,
    /// User defined attributes.
    attributes: serde_json::Map<String, serde_json::Value>,
    /// An optional list of dimension names.
    dimension_names: Option<Vec<Option<String>>>,
}

impl<TStorage: ?Sized> Array<TStorage> {
    /// Get the node path.
    #[must_use]
    pub const fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get the container format.
    #[must_use]
    pub const fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Get the data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Get the fill value.
    #[must_use]
    pub const fn fill_value(&self) -> &FillValue {
        &self.fill_value
    }

    /// Get the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Get the array dimensionality.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape.len()
    }

    /// Get the codecs.
    #[must_use]
    pub const fn codecs(&self) -> &ArrayCodecs {
        &self.codecs
    }

    /// Get the sharding parameters, if the array is sharded.
    #[must_use]
    pub const fn sharding(&self) -> Option<&ShardingParameters> {
        match &self.codecs {
            ArrayCodecs::Chain(_) => None,
            ArrayCodecs::Sharding(sharding) => Some(sharding),
        }
    }

    /// Get the chunk grid.
    ///
    /// For a sharded array, the chunks of the chunk grid are shards.
    #[must_use]
    pub const fn chunk_grid(&self) -> &RegularChunkGrid {
        &self.chunk_grid
    }

    /// Get the chunk key encoding.
    #[must_use]
    pub const fn chunk_key_encoding(&self) -> &ChunkKeyEncoding {
        &self.chunk_key_encoding
    }

    /// Get the attributes.
    #[must_use]
    pub const fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }

    /// Get the dimension names.
    #[must_use]
    pub const fn dimension_names(&self) -> &Option<Vec<Option<String>>> {
        &self.dimension_names
    }

    /// Return an array subset spanning the entire array.
    #[must_use]
    pub fn subset_all(&self) -> ArraySubset {
        ArraySubset::new_with_shape(self.shape.clone())
    }

    /// Return the number of chunks along each dimension.
    #[must_use]
    pub fn chunk_grid_shape(&self) -> ArrayShape {
        self.chunk_grid
            .grid_shape(&self.shape)
            .unwrap_or_default()
    }

    /// Return the array subset of the chunk at `chunk_indices`, truncated to the array bounds.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidChunkGridIndices`] if `chunk_indices` are outside of the chunk grid.
    pub fn chunk_subset(&self, chunk_indices: &[u64]) -> Result<ArraySubset, ArrayError> {
        self.chunk_grid
            .chunk_subset(chunk_indices, &self.shape)?
            .ok_or_else(|| ArrayError::InvalidChunkGridIndices(chunk_indices.to_vec()))
    }

    /// Return the shape of the chunk at `chunk_indices`, truncated to the array bounds.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidChunkGridIndices`] if `chunk_indices` are outside of the chunk grid.
    pub fn chunk_shape(&self, chunk_indices: &[u64]) -> Result<ArrayShape, ArrayError> {
        Ok(self.chunk_subset(chunk_indices)?.shape().to_vec())
    }

    /// Return the store key of the chunk at `chunk_indices`.
    #[must_use]
    pub fn chunk_key(&self, chunk_indices: &[u64]) -> StoreKey {
        data_key(&self.path, &self.chunk_key_encoding.encode(chunk_indices))
    }

    fn validate_element_size<T>(&self) -> Result<(), ArrayError> {
        let size = core::mem::size_of::<T>();
        if size == self.data_type.size() {
            Ok(())
        } else {
            Err(ArrayError::IncompatibleElementSize(size, self.data_type.size()))
        }
    }
}

/// Create an array in `storage` at `path` and store its metadata.
///
/// The array uses the Zarr V3 format, the `default` chunk key encoding with the separator of `layout`,
/// and `codecs` (bytes to bytes codec metadata, created with the default [`CodecRegistry`]) after a little-endian `bytes` codec.
/// Use an [`ArrayBuilder`] for any other configuration.
///
/// # Errors
/// Returns [`ArrayCreateError`] if the configuration is invalid, a codec is unsupported, or the metadata cannot be stored.
pub fn create_dataset<TStorage: ?Sized + ReadableWritableStorageTraits>(
    storage: Arc<TStorage>,
    path: &str,
    shape: ArrayShape,
    chunk_shape: ArrayShape,
    data_type: DataType,
    codecs: Vec<Metadata>,
    layout: ChunkKeyLayout,
) -> Result<Array<TStorage>, ArrayCreateError> {
    let array = ArrayBuilder::new(shape, data_type, chunk_shape)
        .bytes_to_bytes_codecs_metadata(codecs)
        .chunk_key_separator(layout.separator())
        .build(storage, path)?;
    array.store_metadata()?;
    Ok(array)
}

/// Open the array in `storage` at `path`, discovering its format from its metadata.
///
/// # Errors
/// Returns [`ArrayCreateError`] if there is no array metadata at `path` or the metadata is invalid.
pub fn open_dataset<TStorage: ?Sized + crate::storage::ReadableStorageTraits>(
    storage: Arc<TStorage>,
    path: &str,
) -> Result<Array<TStorage>, ArrayCreateError> {
    Array::open(storage, path)
}

/// Apply `f` to each of `items`, on the rayon thread pool if `parallel`.
fn map_chunks<T: Send, U: Send>(items: Vec<T>, parallel: bool, f: impl Fn(T) -> U + Send + Sync) -> Vec<U> {
    if parallel {
        items.into_par_iter().map(f).collect()
    } else {
        items.into_iter().map(f).collect()
    }
}

#[cfg(feature = "ndarray")]
fn elements_to_ndarray<T>(shape: &[u64], elements: Vec<T>) -> Result<ndarray::ArrayD<T>, ArrayError> {
    let length = elements.len();
    let shape = shape
        .iter()
        .map(|&size| usize::try_from(size))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ArrayError::InvalidBytesInputSize(length, shape.iter().product()))?;
    ndarray::ArrayD::<T>::from_shape_vec(shape, elements)
        .map_err(|_| ArrayError::InvalidBytesInputSize(length, length as u64))
}
