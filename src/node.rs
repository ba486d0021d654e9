//! Hierarchy nodes.
//!
//! A node is either an [`Array`](crate::array::Array) or a [`Group`](crate::group::Group) and is addressed by a [`NodePath`].
//! [`node_kind`] probes a store for the metadata documents of every supported format.

mod node_path;

pub use node_path::{NodePath, NodePathError};

use crate::{
    metadata::{ContainerFormat, NodeType},
    storage::{node_metadata_key, ReadableStorageTraits, StorageError},
};

/// The kind and format of a node found in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeKind {
    /// The container format the node metadata was written in.
    pub format: ContainerFormat,
    /// Whether the node is an array or a group.
    pub node_type: NodeType,
}

/// Probe the metadata documents at `path` in discovery order (`zarr.json`, `.zarray`/`.zgroup`, `attributes.json`).
///
/// Returns [`None`] if no metadata exists at `path`.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying store error or a metadata document cannot be parsed.
pub fn node_kind<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<Option<NodeKind>, StorageError> {
    for format in ContainerFormat::DISCOVERY_ORDER {
        for node_type in [NodeType::Array, NodeType::Group] {
            let key = node_metadata_key(path, format, node_type);
            let Some(bytes) = storage.get(&key)? else {
                continue;
            };
            let node_type = match format {
                ContainerFormat::ZarrV3 => {
                    let value: serde_json::Value = serde_json::from_slice(&bytes)
                        .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
                    match value.get("node_type").and_then(serde_json::Value::as_str) {
                        Some("array") => NodeType::Array,
                        Some("group") => NodeType::Group,
                        _ => {
                            return Err(StorageError::InvalidMetadata(
                                key,
                                "missing or invalid node_type".to_string(),
                            ))
                        }
                    }
                }
                ContainerFormat::ZarrV2 => node_type,
                ContainerFormat::N5 => {
                    let value: serde_json::Value = serde_json::from_slice(&bytes)
                        .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
                    if value.get("dimensions").is_some() {
                        NodeType::Array
                    } else {
                        NodeType::Group
                    }
                }
            };
            return Ok(Some(NodeKind { format, node_type }));
        }
    }
    Ok(None)
}
