//! N5 metadata (`attributes.json`).
//!
//! N5 lists dimensions fastest-varying first, so `dimensions` and `blockSize` are the reverse of the row-major array shape and chunk shape.
//! Block payloads are always big-endian.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Metadata, MetadataConfiguration};

/// The N5 version written to the root of a container.
pub const N5_VERSION: &str = "4.0.0";

/// N5 array (dataset) metadata.
///
/// Example:
/// ```json
/// {
///     "dimensions": [3, 512, 512],
///     "blockSize": [1, 100, 100],
///     "dataType": "uint8",
///     "compression": {"type": "gzip", "level": -1, "useZlib": false}
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct N5ArrayMetadata {
    /// The dimensions, fastest-varying first.
    pub dimensions: Vec<u64>,
    /// The block size, fastest-varying first.
    pub block_size: Vec<u64>,
    /// The data type.
    pub data_type: String,
    /// The compression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<N5Compression>,
    /// The compression of N5 versions prior to 1.0.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_type: Option<String>,
    /// User attributes, which share the document.
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// N5 compression: a `type` plus flattened parameters.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct N5Compression {
    /// The compression type.
    #[serde(rename = "type")]
    pub compression_type: String,
    /// The compression parameters.
    #[serde(flatten)]
    pub configuration: MetadataConfiguration,
}

/// An unsupported N5 compression.
#[derive(Debug, Error)]
#[error("N5 compression {0} is not supported")]
pub struct N5CompressionError(pub String);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct N5GzipParameters {
    #[serde(default = "default_gzip_level")]
    level: i64,
    #[serde(default)]
    use_zlib: bool,
}

const fn default_gzip_level() -> i64 {
    -1
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct N5Bzip2Parameters {
    #[serde(default = "default_bzip2_block_size")]
    block_size: u32,
}

const fn default_bzip2_block_size() -> u32 {
    9
}

#[derive(Deserialize)]
struct N5ZstdParameters {
    #[serde(default = "default_zstd_level")]
    level: i32,
}

const fn default_zstd_level() -> i32 {
    3
}

impl N5Compression {
    /// Create an N5 compression from a type and parameters.
    #[must_use]
    pub fn new(compression_type: &str, configuration: MetadataConfiguration) -> Self {
        Self {
            compression_type: compression_type.to_string(),
            configuration,
        }
    }

    /// The uncompressed (`raw`) compression.
    #[must_use]
    pub fn raw() -> Self {
        Self::new("raw", MetadataConfiguration::default())
    }

    /// Convert to codec [`Metadata`], or [`None`] for `raw`.
    ///
    /// # Errors
    /// Returns [`N5CompressionError`] if the compression type is unknown or its parameters are invalid.
    pub fn to_codec_metadata(&self, element_size: usize) -> Result<Option<Metadata>, N5CompressionError> {
        let err = |_| N5CompressionError(self.compression_type.clone());
        let parameters = serde_json::Value::Object(self.configuration.clone());
        let codec = |name: &str, configuration: serde_json::Value| match configuration {
            serde_json::Value::Object(configuration) => {
                Metadata::new_with_configuration(name, configuration)
            }
            _ => Metadata::new(name),
        };
        match self.compression_type.as_str() {
            "raw" => Ok(None),
            "gzip" => {
                let N5GzipParameters { level, use_zlib } =
                    serde_json::from_value(parameters).map_err(err)?;
                let level = if level < 0 { 6 } else { level };
                let name = if use_zlib { "zlib" } else { "gzip" };
                Ok(Some(codec(name, serde_json::json!({ "level": level }))))
            }
            "bzip2" => {
                let N5Bzip2Parameters { block_size } =
                    serde_json::from_value(parameters).map_err(err)?;
                Ok(Some(codec("bz2", serde_json::json!({ "level": block_size }))))
            }
            "zstd" => {
                let N5ZstdParameters { level } = serde_json::from_value(parameters).map_err(err)?;
                Ok(Some(codec("zstd", serde_json::json!({ "level": level }))))
            }
            "blosc" => {
                let mut configuration = self.configuration.clone();
                configuration.remove("nthreads");
                configuration
                    .entry("typesize")
                    .or_insert_with(|| element_size.into());
                Ok(Some(Metadata::new_with_configuration("blosc", configuration)))
            }
            _ => Err(N5CompressionError(self.compression_type.clone())),
        }
    }
}

impl N5ArrayMetadata {
    /// Returns the row-major array shape.
    #[must_use]
    pub fn shape(&self) -> Vec<u64> {
        self.dimensions.iter().rev().copied().collect()
    }

    /// Returns the row-major chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> Vec<u64> {
        self.block_size.iter().rev().copied().collect()
    }

    /// Returns the codec pipeline.
    ///
    /// # Errors
    /// Returns [`N5CompressionError`] if the compression is unsupported.
    pub fn codecs(&self, element_size: usize) -> Result<Vec<Metadata>, N5CompressionError> {
        let compression = match (&self.compression, &self.compression_type) {
            (Some(compression), _) => compression.clone(),
            (None, Some(compression_type)) => {
                N5Compression::new(compression_type, MetadataConfiguration::default())
            }
            (None, None) => N5Compression::raw(),
        };
        Ok(compression
            .to_codec_metadata(element_size)?
            .into_iter()
            .collect())
    }
}

/// N5 group metadata.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct N5GroupMetadata {
    /// The N5 version, present at the container root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n5: Option<String>,
    /// User attributes.
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}
