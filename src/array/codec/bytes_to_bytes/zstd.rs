//! The zstd bytes to bytes codec.
//!
//! Applies [Zstandard](https://facebook.github.io/zstd/) compression, optionally with a content checksum.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::{
    array::codec::{
        codec_metadata, configuration_invalid, BytesToBytesCodecTraits, Codec, CodecError,
        CodecPlugin,
    },
    metadata::{n5::N5Compression, Metadata},
    plugin::PluginCreateError,
};

const IDENTIFIER: &str = "zstd";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_zstd, create_codec_zstd)
}

fn is_name_zstd(name: &str) -> bool {
    name.eq(IDENTIFIER) || name.eq("numcodecs.zstd")
}

fn create_codec_zstd(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: ZstdCodecConfiguration = metadata
        .to_configuration()
        .map_err(|_| configuration_invalid(IDENTIFIER, metadata))?;
    Ok(Codec::new(ZstdCodec::new_with_configuration(&configuration)))
}

/// Configuration parameters for the `zstd` codec.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct ZstdCodecConfiguration {
    /// The compression level. Zero selects the zstd default level.
    #[serde(default)]
    pub level: i32,
    /// Store a checksum when writing that is verified when reading.
    #[serde(default)]
    pub checksum: bool,
}

/// A `zstd` codec implementation.
#[derive(Clone, Debug)]
pub struct ZstdCodec {
    level: i32,
    checksum: bool,
}

impl ZstdCodec {
    /// Create a new `zstd` codec.
    #[must_use]
    pub const fn new(level: i32, checksum: bool) -> Self {
        Self { level, checksum }
    }

    /// Create a new `zstd` codec from configuration.
    #[must_use]
    pub const fn new_with_configuration(configuration: &ZstdCodecConfiguration) -> Self {
        Self::new(configuration.level, configuration.checksum)
    }
}

impl BytesToBytesCodecTraits for ZstdCodec {
    fn create_metadata(&self) -> Metadata {
        codec_metadata(
            IDENTIFIER,
            &ZstdCodecConfiguration {
                level: self.level,
                checksum: self.checksum,
            },
        )
    }

    fn create_metadata_n5(&self) -> Option<N5Compression> {
        let mut configuration = serde_json::Map::new();
        configuration.insert("level".to_string(), self.level.into());
        Some(N5Compression::new("zstd", configuration))
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = zstd::Encoder::new(Vec::new(), self.level)?;
        encoder.include_checksum(self.checksum)?;
        encoder.write_all(&decoded_value)?;
        Ok(encoder.finish()?)
    }

    fn decode(&self, encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(encoded_value.as_slice()).map_err(CodecError::IOError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_zstd_round_trip() {
        let bytes: Vec<u8> = (0..1024u16).flat_map(u16::to_le_bytes).collect();
        for checksum in [false, true] {
            let codec = ZstdCodec::new(5, checksum);
            let encoded = codec.encode(bytes.clone()).unwrap();
            assert_eq!(codec.decode(encoded).unwrap(), bytes);
        }
    }

    #[test]
    fn codec_zstd_checksum_detects_corruption() {
        let bytes: Vec<u8> = (0..255u8).collect();
        let codec = ZstdCodec::new(0, true);
        let mut encoded = codec.encode(bytes).unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        assert!(codec.decode(encoded).is_err());
    }

    #[test]
    fn codec_zstd_configuration_defaults() {
        let configuration: ZstdCodecConfiguration = serde_json::from_str("{}").unwrap();
        assert_eq!(configuration.level, 0);
        assert!(!configuration.checksum);
    }
}
