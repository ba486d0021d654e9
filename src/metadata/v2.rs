//! Zarr V2 metadata (`.zarray`, `.zgroup` and `.zattrs`).

use serde::{Deserialize, Serialize};

use crate::array::chunk_key_encoding::ChunkKeySeparator;

use super::{Metadata, MetadataConfiguration};

/// Zarr V2 array metadata.
///
/// Example:
/// ```json
/// {
///     "zarr_format": 2,
///     "shape": [512, 512, 3],
///     "chunks": [100, 100, 1],
///     "dtype": "|u1",
///     "compressor": {"id": "blosc", "cname": "lz4", "clevel": 5, "shuffle": 1, "blocksize": 0},
///     "fill_value": 0,
///     "order": "C",
///     "filters": null,
///     "dimension_separator": "/"
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ArrayMetadataV2 {
    /// Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
    /// The length of each dimension of the array.
    pub shape: Vec<u64>,
    /// The length of each dimension of a chunk.
    pub chunks: Vec<u64>,
    /// The numpy type string of the elements, including their byte order.
    pub dtype: String,
    /// The primary compression codec, or null.
    pub compressor: Option<CodecMetadataV2>,
    /// The value of uninitialised portions of the array, or null.
    pub fill_value: serde_json::Value,
    /// The memory layout of chunks.
    pub order: ArrayOrderV2,
    /// Codecs applied before the compressor, or null.
    #[serde(default)]
    pub filters: Option<Vec<CodecMetadataV2>>,
    /// The separator between chunk indices in chunk keys.
    #[serde(default = "default_dimension_separator")]
    pub dimension_separator: ChunkKeySeparator,
    /// User attributes, held in the separate `.zattrs` document.
    #[serde(skip)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Unrecognised fields.
    #[serde(flatten)]
    pub additional_fields: serde_json::Map<String, serde_json::Value>,
}

const fn default_dimension_separator() -> ChunkKeySeparator {
    ChunkKeySeparator::Dot
}

/// The memory layout of Zarr V2 chunks.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArrayOrderV2 {
    /// Row-major.
    C,
    /// Column-major.
    F,
}

/// A Zarr V2 (numcodecs) codec: an `id` plus flattened configuration.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct CodecMetadataV2 {
    /// The codec id.
    pub id: String,
    /// The codec configuration.
    #[serde(flatten)]
    pub configuration: MetadataConfiguration,
}

impl CodecMetadataV2 {
    /// Create a numcodecs codec from `metadata`, using its name as the id.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            id: metadata.name().to_string(),
            configuration: metadata.configuration().cloned().unwrap_or_default(),
        }
    }

    /// Convert to [`Metadata`].
    ///
    /// numcodecs codecs take the element size from the array,
    /// so `blosc` gains a `typesize` of `element_size` if it is not set.
    #[must_use]
    pub fn to_metadata(&self, element_size: usize) -> Metadata {
        let mut configuration = self.configuration.clone();
        if self.id == "blosc" && !configuration.contains_key("typesize") {
            configuration.insert("typesize".to_string(), element_size.into());
        }
        Metadata::new_with_configuration(&self.id, configuration)
    }
}

impl ArrayMetadataV2 {
    /// Returns the codec pipeline: the filters followed by the compressor.
    #[must_use]
    pub fn codecs(&self, element_size: usize) -> Vec<Metadata> {
        self.filters
            .iter()
            .flatten()
            .chain(self.compressor.iter())
            .map(|codec| codec.to_metadata(element_size))
            .collect()
    }
}

/// Zarr V2 group metadata.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct GroupMetadataV2 {
    /// Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
}
