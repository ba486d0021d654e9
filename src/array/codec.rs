//! Codecs.
//!
//! A codec is a bidirectional transform over the encoded bytes of a chunk.
//! Every compressor and checksum here is a bytes to bytes codec implementing [`BytesToBytesCodecTraits`].
//! The element byte order of a chunk is handled by the [`BytesCodec`], and a [`CodecChain`] composes both:
//! encoding applies the codecs in order, decoding applies them in reverse.
//!
//! Codecs are created from [`Metadata`] by a [`CodecRegistry`].
//! The registry is assembled once from the [`CodecPlugin`]s submitted with [`inventory`] (or from an explicit plugin list),
//! and is immutable afterwards.

pub mod bytes_to_bytes;

mod bytes;
mod codec_chain;

pub use bytes::{BytesCodec, BytesCodecConfiguration};
pub use codec_chain::CodecChain;

#[cfg(feature = "blosc")]
pub use bytes_to_bytes::blosc::{BloscCodec, BloscCodecConfiguration};
#[cfg(feature = "bz2")]
pub use bytes_to_bytes::bz2::{Bz2Codec, Bz2CodecConfiguration};
pub use bytes_to_bytes::crc32c::Crc32cCodec;
#[cfg(feature = "gzip")]
pub use bytes_to_bytes::gzip::{GzipCodec, GzipCodecConfiguration};
#[cfg(feature = "zlib")]
pub use bytes_to_bytes::zlib::{ZlibCodec, ZlibCodecConfiguration};
#[cfg(feature = "zstd")]
pub use bytes_to_bytes::zstd::{ZstdCodec, ZstdCodecConfiguration};

use std::sync::Arc;

use derive_more::Deref;
use serde::Serialize;
use thiserror::Error;

use crate::{
    metadata::{n5::N5Compression, v2::CodecMetadataV2, Metadata},
    plugin::{Plugin, PluginCreateError},
};

/// A codec plugin.
pub type CodecPlugin = Plugin<Codec>;
inventory::collect!(CodecPlugin);

/// A bytes to bytes codec.
#[derive(Debug, Clone, Deref)]
pub struct Codec(Arc<dyn BytesToBytesCodecTraits>);

impl Codec {
    /// Create a codec.
    pub fn new<T: BytesToBytesCodecTraits + 'static>(codec: T) -> Self {
        Self(Arc::new(codec))
    }
}

/// Traits for bytes to bytes codecs.
pub trait BytesToBytesCodecTraits: core::fmt::Debug + Send + Sync {
    /// Create the Zarr V3 metadata of the codec.
    fn create_metadata(&self) -> Metadata;

    /// Create the numcodecs (Zarr V2) metadata of the codec.
    ///
    /// The default implementation uses the V3 name as the id and the V3 configuration.
    fn create_metadata_v2(&self) -> CodecMetadataV2 {
        CodecMetadataV2::from_metadata(&self.create_metadata())
    }

    /// Create the N5 compression of the codec.
    ///
    /// Returns [`None`] if the codec has no N5 representation.
    fn create_metadata_n5(&self) -> Option<N5Compression> {
        None
    }

    /// Encode bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the codec fails.
    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the codec fails or `encoded_value` is invalid.
    fn decode(&self, encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError>;
}

/// A codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An invalid checksum.
    #[error("the checksum is invalid")]
    InvalidChecksum,
    /// The decoded size does not match the chunk.
    #[error("decoded size {got} is not the expected size {expected}")]
    UnexpectedDecodedSize {
        /// The decoded size.
        got: usize,
        /// The expected size.
        expected: usize,
    },
    /// The codec has no representation in the container format.
    #[error("codec {0} is not supported by the container format")]
    UnsupportedByFormat(String),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for CodecError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for CodecError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// A registry of codec plugins.
///
/// ```
/// # use zarrs_compat::array::codec::CodecRegistry;
/// # use zarrs_compat::metadata::Metadata;
/// let registry = CodecRegistry::default();
/// assert!(registry.create(&Metadata::new("crc32c")).is_ok());
/// assert!(CodecRegistry::empty().create(&Metadata::new("crc32c")).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    plugins: Vec<&'static CodecPlugin>,
}

impl Default for CodecRegistry {
    /// A registry of every codec plugin submitted with [`inventory`].
    fn default() -> Self {
        Self {
            plugins: inventory::iter::<CodecPlugin>.into_iter().collect(),
        }
    }
}

impl CodecRegistry {
    /// Create a registry without any plugins.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Add a plugin to the registry.
    ///
    /// Earlier plugins take precedence if more than one matches a codec name.
    #[must_use]
    pub fn with_plugin(mut self, plugin: &'static CodecPlugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Returns the identifiers of the registered plugins.
    #[must_use]
    pub fn identifiers(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.identifier()).collect()
    }

    /// Create a codec from `metadata`.
    ///
    /// # Errors
    /// Returns [`PluginCreateError::Unsupported`] if no registered plugin handles the codec name,
    /// or another [`PluginCreateError`] if its configuration is invalid.
    pub fn create(&self, metadata: &Metadata) -> Result<Codec, PluginCreateError> {
        self.plugins
            .iter()
            .find(|plugin| plugin.match_name(metadata.name()))
            .ok_or_else(|| PluginCreateError::Unsupported {
                name: metadata.name().to_string(),
                plugin_type: "codec",
            })?
            .create(metadata)
    }
}

/// Create codec metadata from `name` and a configuration that serializes to a JSON object.
pub(crate) fn codec_metadata<T: Serialize>(name: &str, configuration: &T) -> Metadata {
    Metadata::new_with_serializable_configuration(name, configuration)
        .unwrap_or_else(|_| Metadata::new(name))
}

/// Create a plugin configuration error for the codec `identifier`.
pub(crate) fn configuration_invalid(identifier: &'static str, metadata: &Metadata) -> PluginCreateError {
    PluginCreateError::metadata_invalid(identifier, "codec", metadata)
}
