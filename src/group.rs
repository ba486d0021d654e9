//! Groups.
//!
//! A group is a node in a hierarchy that holds user attributes and may have child nodes (groups or [arrays](crate::array)).
//! Containers holding several datasets, such as one array per codec (`gzip`, `blosc/lz4`, `zlib`, `raw`), are written as a group with an array per child path.
//!
//! Group metadata is stored in the document of its [`ContainerFormat`]:
//!  - Zarr V3: `zarr.json` with `"node_type": "group"`,
//!  - Zarr V2: `.zgroup`, with attributes in `.zattrs`, and
//!  - N5: `attributes.json`, where the root of a container also holds the N5 version (`{"n5": "4.0.0"}`).

use std::sync::Arc;

use thiserror::Error;

use crate::{
    metadata::{
        n5::{N5GroupMetadata, N5_VERSION},
        v2::GroupMetadataV2,
        v3::GroupMetadataV3,
        ContainerFormat, NodeType,
    },
    node::{node_kind, NodePath, NodePathError},
    storage::{
        node_metadata_key, retrieve_metadata_json, store_metadata_json, zattrs_key,
        ReadableStorageTraits, ReadableWritableStorageTraits, StorageError,
    },
};

/// A group creation error.
#[derive(Debug, Error)]
pub enum GroupCreateError {
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// A storage error, including invalid metadata documents.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// No group metadata was found at the path.
    #[error("group metadata is missing at {0}")]
    MissingMetadata(NodePath),
}

/// A group.
#[derive(Debug)]
pub struct Group<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    path: NodePath,
    format: ContainerFormat,
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl<TStorage: ?Sized> Group<TStorage> {
    /// Create a group in `storage` at `path` with no attributes.
    ///
    /// This does not write to the store, use [`store_metadata`](Group::store_metadata) to write the group metadata.
    ///
    /// # Errors
    /// Returns [`GroupCreateError::NodePathError`] if `path` is not a valid node path.
    pub fn new(storage: Arc<TStorage>, path: &str, format: ContainerFormat) -> Result<Self, GroupCreateError> {
        Ok(Self {
            storage,
            path: NodePath::new(path)?,
            format,
            attributes: serde_json::Map::default(),
        })
    }

    /// Set the user defined attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: serde_json::Map<String, serde_json::Value>) -> Self {
        self.attributes = attributes;
        self
    }

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

    /// Get the attributes.
    #[must_use]
    pub const fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }

    /// Mutably borrow the attributes.
    #[must_use]
    pub fn attributes_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        &mut self.attributes
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> Group<TStorage> {
    /// Open the group at `path`, discovering its format from its metadata.
    ///
    /// # Errors
    /// Returns [`GroupCreateError::MissingMetadata`] if there is no metadata at `path` or the node is an array,
    /// or [`GroupCreateError::StorageError`] if the metadata is invalid.
    pub fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupCreateError> {
        let path = NodePath::new(path)?;
        let missing = || GroupCreateError::MissingMetadata(path.clone());
        let kind = node_kind(&*storage, &path)?.ok_or_else(missing)?;
        if kind.node_type != NodeType::Group {
            return Err(missing());
        }
        let key = node_metadata_key(&path, kind.format, NodeType::Group);
        let attributes = match kind.format {
            ContainerFormat::ZarrV3 => {
                let metadata: GroupMetadataV3 =
                    retrieve_metadata_json(&*storage, &key)?.ok_or_else(missing)?;
                metadata.attributes
            }
            ContainerFormat::ZarrV2 => {
                retrieve_metadata_json::<_, GroupMetadataV2>(&*storage, &key)?.ok_or_else(missing)?;
                retrieve_metadata_json(&*storage, &zattrs_key(&path))?.unwrap_or_default()
            }
            ContainerFormat::N5 => {
                let metadata: N5GroupMetadata =
                    retrieve_metadata_json(&*storage, &key)?.ok_or_else(missing)?;
                metadata.attributes
            }
        };
        log::debug!("opening {} group at {path}", kind.format);
        Ok(Self {
            storage,
            path,
            format: kind.format,
            attributes,
        })
    }
}

impl<TStorage: ?Sized + ReadableWritableStorageTraits> Group<TStorage> {
    /// Store the metadata of the group in its container format.
    ///
    /// Storing an N5 group also marks the root of the container with the N5 version.
    ///
    /// # Errors
    /// Returns [`StorageError`] if there is an underlying store error.
    pub fn store_metadata(&self) -> Result<(), StorageError> {
        let storage = &*self.storage;
        let key = node_metadata_key(&self.path, self.format, NodeType::Group);
        match self.format {
            ContainerFormat::ZarrV3 => {
                store_metadata_json(storage, &key, &GroupMetadataV3::new(self.attributes.clone()))?;
            }
            ContainerFormat::ZarrV2 => {
                store_metadata_json(storage, &key, &GroupMetadataV2::default())?;
                if !self.attributes.is_empty() {
                    store_metadata_json(storage, &zattrs_key(&self.path), &self.attributes)?;
                }
            }
            ContainerFormat::N5 => {
                let metadata = N5GroupMetadata {
                    n5: self.path.is_root().then(|| N5_VERSION.to_string()),
                    attributes: self.attributes.clone(),
                };
                store_metadata_json(storage, &key, &metadata)?;
                if !self.path.is_root() {
                    ensure_n5_root(storage)?;
                }
            }
        }
        log::debug!("stored {} group metadata at {key}", self.format);
        Ok(())
    }
}

/// Ensure the root of an N5 container holds the N5 version, keeping any root attributes.
pub(crate) fn ensure_n5_root<TStorage: ?Sized + ReadableWritableStorageTraits>(
    storage: &TStorage,
) -> Result<(), StorageError> {
    let key = node_metadata_key(&NodePath::root(), ContainerFormat::N5, NodeType::Group);
    let mut metadata: N5GroupMetadata = retrieve_metadata_json(storage, &key)?.unwrap_or_default();
    if metadata.n5.is_some() {
        return Ok(());
    }
    metadata.n5 = Some(N5_VERSION.to_string());
    store_metadata_json(storage, &key, &metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{store::MemoryStore, StoreKey};

    fn attributes() -> serde_json::Map<String, serde_json::Value> {
        serde_json::json!({"description": "codec comparison"})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn group_v3() {
        let store = Arc::new(MemoryStore::new());
        Group::new(store.clone(), "/", ContainerFormat::ZarrV3)
            .unwrap()
            .with_attributes(attributes())
            .store_metadata()
            .unwrap();
        let group = Group::open(store, "/").unwrap();
        assert_eq!(group.format(), ContainerFormat::ZarrV3);
        assert_eq!(group.attributes(), &attributes());
    }

    #[test]
    fn group_v2() {
        let store = Arc::new(MemoryStore::new());
        Group::new(store.clone(), "/blosc", ContainerFormat::ZarrV2)
            .unwrap()
            .with_attributes(attributes())
            .store_metadata()
            .unwrap();
        assert!(store.get(&StoreKey::new("blosc/.zgroup").unwrap()).unwrap().is_some());
        assert!(store.get(&StoreKey::new("blosc/.zattrs").unwrap()).unwrap().is_some());
        let group = Group::open(store, "/blosc").unwrap();
        assert_eq!(group.format(), ContainerFormat::ZarrV2);
        assert_eq!(group.attributes(), &attributes());
    }

    #[test]
    fn group_n5_root() {
        let store = Arc::new(MemoryStore::new());
        Group::new(store.clone(), "/blosc", ContainerFormat::N5)
            .unwrap()
            .store_metadata()
            .unwrap();
        let root: serde_json::Value = serde_json::from_slice(
            &store.get(&StoreKey::new("attributes.json").unwrap()).unwrap().unwrap(),
        )
        .unwrap();
        assert_eq!(root, serde_json::json!({"n5": "4.0.0"}));
        let group = Group::open(store.clone(), "/blosc").unwrap();
        assert_eq!(group.format(), ContainerFormat::N5);
        assert!(group.attributes().is_empty());
        assert!(Group::open(store, "/").is_ok());
    }

    #[test]
    fn group_missing() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            Group::open(store, "/none"),
            Err(GroupCreateError::MissingMetadata(_))
        ));
    }
}
