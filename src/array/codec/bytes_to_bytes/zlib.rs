//! The zlib bytes to bytes codec.
//!
//! Applies deflate compression in the zlib stream format.
//! In N5 this is the `gzip` compression type with `useZlib` set.

use std::io::{Cursor, Read};

use flate2::bufread::{ZlibDecoder, ZlibEncoder};
use serde::{Deserialize, Serialize};

use crate::{
    array::codec::{
        codec_metadata, configuration_invalid, BytesToBytesCodecTraits, Codec, CodecError,
        CodecPlugin,
    },
    metadata::{n5::N5Compression, Metadata},
    plugin::PluginCreateError,
};

use super::{DeflateCompressionLevel, DeflateCompressionLevelError};

const IDENTIFIER: &str = "zlib";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_zlib, create_codec_zlib)
}

fn is_name_zlib(name: &str) -> bool {
    name.eq(IDENTIFIER) || name.eq("numcodecs.zlib")
}

fn create_codec_zlib(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: ZlibCodecConfiguration = metadata
        .to_configuration()
        .map_err(|_| configuration_invalid(IDENTIFIER, metadata))?;
    Ok(Codec::new(ZlibCodec::new_with_configuration(&configuration)))
}

/// Configuration parameters for the `zlib` codec.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct ZlibCodecConfiguration {
    /// The compression level.
    pub level: DeflateCompressionLevel,
}

/// A `zlib` codec implementation.
#[derive(Clone, Debug)]
pub struct ZlibCodec {
    compression_level: DeflateCompressionLevel,
}

impl ZlibCodec {
    /// Create a new `zlib` codec.
    ///
    /// # Errors
    /// Returns [`DeflateCompressionLevelError`] if `compression_level` is not valid.
    pub fn new(compression_level: u32) -> Result<Self, DeflateCompressionLevelError> {
        Ok(Self {
            compression_level: compression_level.try_into()?,
        })
    }

    /// Create a new `zlib` codec from configuration.
    #[must_use]
    pub const fn new_with_configuration(configuration: &ZlibCodecConfiguration) -> Self {
        Self {
            compression_level: configuration.level,
        }
    }
}

impl BytesToBytesCodecTraits for ZlibCodec {
    fn create_metadata(&self) -> Metadata {
        codec_metadata(
            IDENTIFIER,
            &ZlibCodecConfiguration {
                level: self.compression_level,
            },
        )
    }

    fn create_metadata_n5(&self) -> Option<N5Compression> {
        let mut configuration = serde_json::Map::new();
        configuration.insert("level".to_string(), self.compression_level.as_u32().into());
        configuration.insert("useZlib".to_string(), true.into());
        Some(N5Compression::new("gzip", configuration))
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(
            Cursor::new(decoded_value),
            flate2::Compression::new(self.compression_level.as_u32()),
        );
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(&self, encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut decoder = ZlibDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}
