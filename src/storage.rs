//! Chunk storage.
//!
//! A store is a key-value map from [`StoreKey`] to bytes.
//! The engine only talks to stores through the [`ReadableStorageTraits`], [`WritableStorageTraits`] and [`ListableStorageTraits`] interfaces,
//! so any backend (a directory tree, an in-memory map, a remote object store) can hold a hierarchy.
//!
//! This crate includes a [`FilesystemStore`](store::FilesystemStore) and a [`MemoryStore`](store::MemoryStore).

mod storage_sync;
pub mod store;
mod store_key;
mod store_prefix;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    byte_range::InvalidByteRangeError,
    metadata::{ContainerFormat, NodeType},
    node::NodePath,
};

pub use store_key::{StoreKey, StoreKeyError, StoreKeys};
pub use store_prefix::{StorePrefix, StorePrefixError};

pub use self::storage_sync::{
    ListableStorageTraits, ReadableListableStorageTraits, ReadableStorageTraits,
    ReadableWritableListableStorageTraits, ReadableWritableStorageTraits, WritableStorageTraits,
};

/// Bytes held in, or written to, a store.
pub type Bytes = bytes::Bytes;

/// Bytes which may be absent.
pub type MaybeBytes = Option<Bytes>;

/// [`Arc`] wrapped readable storage.
pub type ReadableStorage = Arc<dyn ReadableStorageTraits>;

/// [`Arc`] wrapped readable, writable and listable storage.
pub type ReadableWritableListableStorage = Arc<dyn ReadableWritableListableStorageTraits>;

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write operation was attempted on a read only store.
    #[error("a write operation was attempted on a read only store")]
    ReadOnly,
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An error serializing or deserializing JSON.
    #[error("error parsing metadata for {0}: {1}")]
    InvalidMetadata(StoreKey, String),
    /// An invalid store prefix.
    #[error("invalid store prefix {0}")]
    StorePrefixError(#[from] StorePrefixError),
    /// An invalid store key.
    #[error("invalid store key {0}")]
    InvalidStoreKey(#[from] StoreKeyError),
    /// An invalid byte range.
    #[error(transparent)]
    InvalidByteRangeError(#[from] InvalidByteRangeError),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// Return the metadata document name of a node of `node_type` in `format`.
#[must_use]
pub const fn node_metadata_name(format: ContainerFormat, node_type: NodeType) -> &'static str {
    match (format, node_type) {
        (ContainerFormat::ZarrV3, _) => "zarr.json",
        (ContainerFormat::ZarrV2, NodeType::Array) => ".zarray",
        (ContainerFormat::ZarrV2, NodeType::Group) => ".zgroup",
        (ContainerFormat::N5, _) => "attributes.json",
    }
}

/// Return the key of the metadata document of the node at `path`.
#[must_use]
pub fn node_metadata_key(path: &NodePath, format: ContainerFormat, node_type: NodeType) -> StoreKey {
    let name = node_metadata_name(format, node_type);
    StoreKey::from_validated(format!("{}{name}", StorePrefix::from(path).as_str()))
}

/// Return the key of the Zarr V2 attributes document (`.zattrs`) of the node at `path`.
#[must_use]
pub fn zattrs_key(path: &NodePath) -> StoreKey {
    StoreKey::from_validated(format!("{}.zattrs", StorePrefix::from(path).as_str()))
}

/// Return the key of a chunk (or shard) of the array at `path`, where `chunk_key` is relative to the array.
#[must_use]
pub fn data_key(path: &NodePath, chunk_key: &StoreKey) -> StoreKey {
    StoreKey::from_validated(format!("{}{chunk_key}", StorePrefix::from(path).as_str()))
}

/// Serialize `metadata` as pretty JSON and store it at `key`.
///
/// # Errors
/// Returns a [`StorageError`] if serialization or the underlying store operation fails.
pub fn store_metadata_json<TStorage: ?Sized + WritableStorageTraits, T: serde::Serialize>(
    storage: &TStorage,
    key: &StoreKey,
    metadata: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(metadata)
        .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
    storage.set(key, json.into())
}

/// Retrieve and deserialize the JSON document at `key`.
///
/// Returns [`None`] if the key does not exist.
///
/// # Errors
/// Returns a [`StorageError`] if the document is not valid JSON of type `T` or the underlying store operation fails.
pub fn retrieve_metadata_json<TStorage: ?Sized + ReadableStorageTraits, T: serde::de::DeserializeOwned>(
    storage: &TStorage,
    key: &StoreKey,
) -> Result<Option<T>, StorageError> {
    storage
        .get(key)?
        .map(|bytes| {
            serde_json::from_slice(&bytes)
                .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_and_data_keys() {
        let path = NodePath::new("/blosc/lz4").unwrap();
        assert_eq!(
            node_metadata_key(&path, ContainerFormat::ZarrV2, NodeType::Array).as_str(),
            "blosc/lz4/.zarray"
        );
        assert_eq!(
            node_metadata_key(&NodePath::root(), ContainerFormat::ZarrV3, NodeType::Group).as_str(),
            "zarr.json"
        );
        assert_eq!(
            node_metadata_key(&path, ContainerFormat::N5, NodeType::Array).as_str(),
            "blosc/lz4/attributes.json"
        );
        let chunk_key = StoreKey::new("c/0/1/2").unwrap();
        assert_eq!(data_key(&path, &chunk_key).as_str(), "blosc/lz4/c/0/1/2");
    }
}
