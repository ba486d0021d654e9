//! The gzip bytes to bytes codec.
//!
//! Applies gzip compression.
//! The V3 name is `gzip`, the numcodecs id is `gzip`, and the N5 compression type is `gzip`.

use std::io::{Cursor, Read};

use flate2::bufread::{GzDecoder, GzEncoder};
use serde::{Deserialize, Serialize};

use super::{DeflateCompressionLevel, DeflateCompressionLevelError};
use crate::{
    array::codec::{
        codec_metadata, configuration_invalid, BytesToBytesCodecTraits, Codec, CodecError,
        CodecPlugin,
    },
    metadata::{n5::N5Compression, Metadata},
    plugin::PluginCreateError,
};

const IDENTIFIER: &str = "gzip";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_gzip, create_codec_gzip)
}

fn is_name_gzip(name: &str) -> bool {
    name.eq(IDENTIFIER) || name.eq("numcodecs.gzip")
}

fn create_codec_gzip(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: GzipCodecConfiguration = metadata
        .to_configuration()
        .map_err(|_| configuration_invalid(IDENTIFIER, metadata))?;
    Ok(Codec::new(GzipCodec::new_with_configuration(&configuration)))
}

/// Configuration parameters for the `gzip` codec.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct GzipCodecConfiguration {
    /// The compression level.
    pub level: DeflateCompressionLevel,
}

/// A `gzip` codec implementation.
#[derive(Clone, Debug)]
pub struct GzipCodec {
    compression_level: DeflateCompressionLevel,
}

impl GzipCodec {
    /// Create a new `gzip` codec.
    ///
    /// # Errors
    /// Returns [`DeflateCompressionLevelError`] if `compression_level` is not valid.
    pub fn new(compression_level: u32) -> Result<Self, DeflateCompressionLevelError> {
        Ok(Self {
            compression_level: compression_level.try_into()?,
        })
    }

    /// Create a new `gzip` codec from configuration.
    #[must_use]
    pub const fn new_with_configuration(configuration: &GzipCodecConfiguration) -> Self {
        Self {
            compression_level: configuration.level,
        }
    }
}

impl BytesToBytesCodecTraits for GzipCodec {
    fn create_metadata(&self) -> Metadata {
        codec_metadata(
            IDENTIFIER,
            &GzipCodecConfiguration {
                level: self.compression_level,
            },
        )
    }

    fn create_metadata_n5(&self) -> Option<N5Compression> {
        let mut configuration = serde_json::Map::new();
        configuration.insert("level".to_string(), self.compression_level.as_u32().into());
        Some(N5Compression::new("gzip", configuration))
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(
            Cursor::new(decoded_value),
            flate2::Compression::new(self.compression_level.as_u32()),
        );
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(&self, encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut decoder = GzDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_VALID: &str = r#"{
        "level": 1
    }"#;

    #[test]
    fn codec_gzip_configuration_valid() {
        assert!(serde_json::from_str::<GzipCodecConfiguration>(JSON_VALID).is_ok());
    }

    #[test]
    fn codec_gzip_configuration_invalid() {
        assert!(serde_json::from_str::<GzipCodecConfiguration>(r#"{"level": -1}"#).is_err());
        assert!(serde_json::from_str::<GzipCodecConfiguration>(r#"{"level": 10}"#).is_err());
        assert!(GzipCodec::new(10).is_err());
    }

    #[test]
    fn codec_gzip_round_trip() {
        let bytes: Vec<u8> = (0..64u16).flat_map(u16::to_ne_bytes).collect();
        let configuration: GzipCodecConfiguration = serde_json::from_str(JSON_VALID).unwrap();
        let codec = GzipCodec::new_with_configuration(&configuration);

        let encoded = codec.encode(bytes.clone()).unwrap();
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
        assert_eq!(codec.decode(encoded).unwrap(), bytes);
    }

    #[test]
    fn codec_gzip_empty() {
        let codec = GzipCodec::new(5).unwrap();
        let encoded = codec.encode(vec![]).unwrap();
        assert!(codec.decode(encoded).unwrap().is_empty());
    }

    #[test]
    fn codec_gzip_corrupt() {
        let codec = GzipCodec::new(5).unwrap();
        assert!(codec.decode(vec![1, 2, 3, 4]).is_err());
    }

    #[test]
    fn codec_gzip_metadata() {
        let codec = GzipCodec::new(5).unwrap();
        assert_eq!(
            serde_json::to_string(&codec.create_metadata()).unwrap(),
            r#"{"name":"gzip","configuration":{"level":5}}"#
        );
        assert_eq!(
            serde_json::to_string(&codec.create_metadata_v2()).unwrap(),
            r#"{"id":"gzip","level":5}"#
        );
        assert_eq!(
            serde_json::to_string(&codec.create_metadata_n5()).unwrap(),
            r#"{"type":"gzip","level":5}"#
        );
    }
}
