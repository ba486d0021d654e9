//! The bz2 bytes to bytes codec.
//!
//! Applies bzip2 compression. The N5 compression type is `bzip2`, with the level stored as `blockSize`.

use std::io::Read;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    array::codec::{
        codec_metadata, configuration_invalid, BytesToBytesCodecTraits, Codec, CodecError,
        CodecPlugin,
    },
    metadata::{n5::N5Compression, Metadata},
    plugin::PluginCreateError,
};

const IDENTIFIER: &str = "bz2";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_bz2, create_codec_bz2)
}

fn is_name_bz2(name: &str) -> bool {
    matches!(name, IDENTIFIER | "numcodecs.bz2" | "bzip2")
}

fn create_codec_bz2(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: Bz2CodecConfiguration = metadata
        .to_configuration()
        .map_err(|_| configuration_invalid(IDENTIFIER, metadata))?;
    Ok(Codec::new(Bz2Codec::new_with_configuration(&configuration)))
}

/// A bzip2 compression level, an integer from 1 to 9.
#[derive(Serialize, Copy, Clone, Eq, PartialEq, Debug)]
pub struct Bz2CompressionLevel(u32);

/// An invalid bzip2 compression level.
#[derive(Debug, Error)]
#[error("invalid bz2 compression level {0}, must be 1-9")]
pub struct Bz2CompressionLevelError(u32);

impl TryFrom<u32> for Bz2CompressionLevel {
    type Error = Bz2CompressionLevelError;

    fn try_from(level: u32) -> Result<Self, Self::Error> {
        if (1..=9).contains(&level) {
            Ok(Self(level))
        } else {
            Err(Bz2CompressionLevelError(level))
        }
    }
}

impl<'de> Deserialize<'de> for Bz2CompressionLevel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Self::try_from(u32::deserialize(d)?).map_err(serde::de::Error::custom)
    }
}

/// Configuration parameters for the `bz2` codec.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct Bz2CodecConfiguration {
    /// The compression level.
    pub level: Bz2CompressionLevel,
}

/// A `bz2` codec implementation.
#[derive(Clone, Debug)]
pub struct Bz2Codec {
    level: Bz2CompressionLevel,
}

impl Bz2Codec {
    /// Create a new `bz2` codec.
    ///
    /// # Errors
    /// Returns [`Bz2CompressionLevelError`] if `level` is not valid.
    pub fn new(level: u32) -> Result<Self, Bz2CompressionLevelError> {
        Ok(Self {
            level: level.try_into()?,
        })
    }

    /// Create a new `bz2` codec from configuration.
    #[must_use]
    pub const fn new_with_configuration(configuration: &Bz2CodecConfiguration) -> Self {
        Self {
            level: configuration.level,
        }
    }
}

impl BytesToBytesCodecTraits for Bz2Codec {
    fn create_metadata(&self) -> Metadata {
        codec_metadata(IDENTIFIER, &Bz2CodecConfiguration { level: self.level })
    }

    fn create_metadata_n5(&self) -> Option<N5Compression> {
        let mut configuration = serde_json::Map::new();
        configuration.insert("blockSize".to_string(), self.level.0.into());
        Some(N5Compression::new("bzip2", configuration))
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = bzip2::read::BzEncoder::new(
            decoded_value.as_slice(),
            bzip2::Compression::new(self.level.0),
        );
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(&self, encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut decoder = bzip2::read::BzDecoder::new(encoded_value.as_slice());
        let mut out: Vec<u8> = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_bz2_configuration() {
        assert!(serde_json::from_str::<Bz2CodecConfiguration>(r#"{"level": 5}"#).is_ok());
        assert!(serde_json::from_str::<Bz2CodecConfiguration>(r#"{"level": 10}"#).is_err());
        assert!(serde_json::from_str::<Bz2CodecConfiguration>(r#"{"level": 0}"#).is_err());
    }

    #[test]
    fn codec_bz2_round_trip() {
        let bytes: Vec<u8> = (0..32u32).flat_map(u32::to_ne_bytes).collect();
        let codec = Bz2Codec::new(9).unwrap();
        let encoded = codec.encode(bytes.clone()).unwrap();
        assert_eq!(&encoded[..3], b"BZh");
        assert_eq!(codec.decode(encoded).unwrap(), bytes);
    }

    #[test]
    fn codec_bz2_n5() {
        let codec = Bz2Codec::new(3).unwrap();
        assert_eq!(
            serde_json::to_string(&codec.create_metadata_n5()).unwrap(),
            r#"{"type":"bzip2","blockSize":3}"#
        );
        assert!(is_name_bz2("bzip2"));
    }
}
