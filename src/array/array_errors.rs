use thiserror::Error;

use crate::{
    array_subset::{ArrayCopyBytesError, ArraySubset, IncompatibleDimensionalityError},
    metadata::ContainerFormat,
    node::{NodePath, NodePathError},
    plugin::PluginCreateError,
    storage::{StorageError, StoreKey},
};

use super::{
    chunk_grid::InvalidChunkShapeError,
    chunk_key_encoding::InvalidChunkKeyError,
    codec::CodecError,
    data_type::{IncompatibleFillValueMetadataError, UnsupportedDataTypeError},
    n5_block::N5BlockError,
    sharding::ShardingError,
    ArrayIndices, ArrayShape, DataType,
};

/// An array creation error.
#[derive(Debug, Error)]
pub enum ArrayCreateError {
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// A storage error, including invalid metadata documents.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// No array metadata was found at the path.
    #[error("array metadata is missing at {0}")]
    MissingMetadata(NodePath),
    /// A codec is not registered.
    #[error(transparent)]
    UnsupportedCodec(PluginCreateError),
    /// A codec configuration is invalid.
    #[error(transparent)]
    CodecsCreateError(PluginCreateError),
    /// A codec cannot encode the data type.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// The chunk grid is invalid.
    #[error(transparent)]
    ChunkGridCreateError(PluginCreateError),
    /// The chunk key encoding is invalid.
    #[error(transparent)]
    ChunkKeyEncodingCreateError(PluginCreateError),
    /// The chunk shape is invalid.
    #[error(transparent)]
    InvalidChunkShape(#[from] InvalidChunkShapeError),
    /// The shard shape is invalid.
    #[error(transparent)]
    InvalidShardShape(ShardingError),
    /// Unsupported data type.
    #[error(transparent)]
    DataTypeCreateError(#[from] UnsupportedDataTypeError),
    /// Invalid fill value metadata.
    #[error(transparent)]
    InvalidFillValueMetadata(#[from] IncompatibleFillValueMetadataError),
    /// The fill value size does not match the data type.
    #[error("fill value with {1} bytes is incompatible with data type {0}")]
    InvalidFillValue(DataType, usize),
    /// The dimensionality of the chunk grid does not match the array shape.
    #[error("chunk grid dimensionality {0} does not match array dimensionality {1}")]
    InvalidChunkGridDimensionality(usize, usize),
    /// The number of dimension names does not match the array dimensionality.
    #[error("the number of dimension names {0} does not match array dimensionality {1}")]
    InvalidDimensionNames(usize, usize),
    /// The configuration cannot be expressed in the container format.
    #[error("{format} does not support {reason}")]
    UnsupportedByFormat {
        /// The container format.
        format: ContainerFormat,
        /// The unsupported feature.
        reason: String,
    },
}

impl ArrayCreateError {
    /// Classify a codec creation error, separating unregistered codecs from invalid configurations.
    #[must_use]
    pub fn from_codec_create_error(err: PluginCreateError) -> Self {
        match err {
            PluginCreateError::Unsupported { .. } => Self::UnsupportedCodec(err),
            _ => Self::CodecsCreateError(err),
        }
    }

    pub(crate) fn unsupported_by_format(format: ContainerFormat, reason: impl Into<String>) -> Self {
        Self::UnsupportedByFormat {
            format,
            reason: reason.into(),
        }
    }
}

/// Array errors.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A store error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A codec error.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionalityError(#[from] IncompatibleDimensionalityError),
    /// A region copy error.
    #[error(transparent)]
    ArrayCopyBytesError(#[from] ArrayCopyBytesError),
    /// The shape of the written array does not match the array.
    #[error("got array with shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        /// The shape of the written array.
        got: ArrayShape,
        /// The shape of the array.
        expected: ArrayShape,
    },
    /// An unexpected bytes input size.
    #[error("got bytes with size {0}, expected {1}")]
    InvalidBytesInputSize(usize, u64),
    /// The array subset is not within the array.
    #[error("array subset {0} is not compatible with array shape {1:?}")]
    InvalidArraySubset(ArraySubset, ArrayShape),
    /// The chunk grid indices are outside of the chunk grid.
    #[error("chunk grid indices {0:?} are outside of the chunk grid")]
    InvalidChunkGridIndices(ArrayIndices),
    /// A stored chunk does not decode to a valid chunk.
    #[error("chunk {key} is corrupt: {reason}")]
    CorruptChunk {
        /// The chunk key.
        key: StoreKey,
        /// Why the chunk is corrupt.
        reason: String,
    },
    /// A stored shard has a missing or invalid index.
    #[error("shard {key} is corrupt: {reason}")]
    CorruptShard {
        /// The shard key.
        key: StoreKey,
        /// Why the shard is corrupt.
        reason: String,
    },
    /// A store key is not a valid chunk key.
    #[error(transparent)]
    InvalidKey(#[from] InvalidChunkKeyError),
    /// A shard could not be assembled.
    #[error(transparent)]
    ShardingError(#[from] ShardingError),
    /// An N5 block header could not be written.
    #[error(transparent)]
    N5BlockError(#[from] N5BlockError),
    /// Incompatible element size.
    #[error("got element size {0}, expected {1}")]
    IncompatibleElementSize(usize, usize),
}

impl ArrayError {
    /// Create an error with the same message for another member chunk of a failed shard.
    pub(crate) fn for_member(&self, key: &StoreKey) -> Self {
        match self {
            Self::StorageError(err) => Self::StorageError(StorageError::Other(err.to_string())),
            Self::CorruptShard { reason, .. } => Self::CorruptShard {
                key: key.clone(),
                reason: reason.clone(),
            },
            err => Self::CorruptShard {
                key: key.clone(),
                reason: err.to_string(),
            },
        }
    }
}

/// A chunk that could not be read.
///
/// For a sharded array, `chunk_indices` are the indices of an inner chunk.
#[derive(Debug)]
pub struct ChunkReadFailure {
    /// The chunk grid indices of the chunk.
    pub chunk_indices: ArrayIndices,
    /// The reason the chunk could not be read.
    pub error: ArrayError,
}

impl std::fmt::Display for ChunkReadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chunk {:?}: {}", self.chunk_indices, self.error)
    }
}
