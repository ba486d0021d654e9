//! Zarr V3 metadata (`zarr.json`).

use serde::{Deserialize, Serialize};

use super::Metadata;

/// Zarr V3 array metadata.
///
/// Example:
/// ```json
/// {
///   "zarr_format": 3,
///   "node_type": "array",
///   "shape": [512, 512, 3],
///   "data_type": "uint8",
///   "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": [100, 100, 1]}},
///   "chunk_key_encoding": {"name": "default", "configuration": {"separator": "/"}},
///   "fill_value": 0,
///   "codecs": [{"name": "bytes", "configuration": {"endian": "little"}}, {"name": "gzip", "configuration": {"level": 5}}],
///   "attributes": {}
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ArrayMetadataV3 {
    /// An integer defining the version of the storage specification to which the array adheres. Must be `3`.
    pub zarr_format: monostate::MustBe!(3u64),
    /// A string defining the type of hierarchy node element. Must be `array`.
    pub node_type: monostate::MustBe!("array"),
    /// The length of each dimension of the array.
    pub shape: Vec<u64>,
    /// The data type of the array.
    pub data_type: String,
    /// The chunk grid of the array.
    pub chunk_grid: Metadata,
    /// The mapping from chunk grid cell coordinates to keys in the underlying store.
    pub chunk_key_encoding: Metadata,
    /// The value of uninitialised portions of the array.
    pub fill_value: serde_json::Value,
    /// The list of codecs used to encode chunks.
    pub codecs: Vec<Metadata>,
    /// User defined attributes.
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Storage transformers. None are supported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage_transformers: Vec<Metadata>,
    /// The names of the dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_names: Option<Vec<Option<String>>>,
    /// Unrecognised fields.
    #[serde(flatten)]
    pub additional_fields: serde_json::Map<String, serde_json::Value>,
}

impl ArrayMetadataV3 {
    /// Create new Zarr V3 array metadata.
    #[must_use]
    pub fn new(
        shape: Vec<u64>,
        data_type: String,
        chunk_grid: Metadata,
        chunk_key_encoding: Metadata,
        fill_value: serde_json::Value,
        codecs: Vec<Metadata>,
    ) -> Self {
        Self {
            zarr_format: monostate::MustBe!(3u64),
            node_type: monostate::MustBe!("array"),
            shape,
            data_type,
            chunk_grid,
            chunk_key_encoding,
            fill_value,
            codecs,
            attributes: serde_json::Map::default(),
            storage_transformers: vec![],
            dimension_names: None,
            additional_fields: serde_json::Map::default(),
        }
    }
}

/// Zarr V3 group metadata.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct GroupMetadataV3 {
    /// Must be `3`.
    pub zarr_format: monostate::MustBe!(3u64),
    /// Must be `group`.
    pub node_type: monostate::MustBe!("group"),
    /// User defined attributes.
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl GroupMetadataV3 {
    /// Create new Zarr V3 group metadata with `attributes`.
    #[must_use]
    pub fn new(attributes: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            zarr_format: monostate::MustBe!(3u64),
            node_type: monostate::MustBe!("group"),
            attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARRAY: &str = r#"{
        "zarr_format": 3,
        "node_type": "array",
        "shape": [512, 512, 3],
        "data_type": "uint8",
        "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": [100, 100, 1]}},
        "chunk_key_encoding": {"name": "default", "configuration": {"separator": "/"}},
        "fill_value": 0,
        "codecs": [{"name": "bytes", "configuration": {"endian": "little"}}, {"name": "gzip", "configuration": {"level": 5}}],
        "attributes": {"source": "astronaut"}
    }"#;

    #[test]
    fn array_metadata_v3() {
        let metadata: ArrayMetadataV3 = serde_json::from_str(ARRAY).unwrap();
        assert_eq!(metadata.shape, vec![512, 512, 3]);
        assert_eq!(metadata.data_type, "uint8");
        assert_eq!(metadata.codecs.len(), 2);
        assert_eq!(metadata.codecs[1].name(), "gzip");
        assert!(metadata.additional_fields.is_empty());
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(serde_json::from_str::<ArrayMetadataV3>(&json).unwrap(), metadata);
    }

    #[test]
    fn array_metadata_v3_wrong_node_type() {
        let group = ARRAY.replace(r#""node_type": "array""#, r#""node_type": "group""#);
        assert!(serde_json::from_str::<ArrayMetadataV3>(&group).is_err());
        let v2 = ARRAY.replace(r#""zarr_format": 3"#, r#""zarr_format": 2"#);
        assert!(serde_json::from_str::<ArrayMetadataV3>(&v2).is_err());
    }

    #[test]
    fn group_metadata_v3() {
        let group: GroupMetadataV3 =
            serde_json::from_str(r#"{"zarr_format":3,"node_type":"group"}"#).unwrap();
        assert!(group.attributes.is_empty());
    }
}
