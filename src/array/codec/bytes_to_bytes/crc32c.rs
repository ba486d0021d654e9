//! The crc32c bytes to bytes codec.
//!
//! Appends a little-endian CRC32C checksum to the input bytes.

use crate::{
    array::codec::{configuration_invalid, BytesToBytesCodecTraits, Codec, CodecError, CodecPlugin},
    config::global_config,
    metadata::Metadata,
    plugin::PluginCreateError,
};

const IDENTIFIER: &str = "crc32c";

/// The size of the checksum in bytes.
pub const CHECKSUM_SIZE: usize = core::mem::size_of::<u32>();

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_crc32c, create_codec_crc32c)
}

fn is_name_crc32c(name: &str) -> bool {
    name.eq(IDENTIFIER) || name.eq("numcodecs.crc32c")
}

fn create_codec_crc32c(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    if metadata.configuration_is_none_or_empty() {
        Ok(Codec::new(Crc32cCodec))
    } else {
        Err(configuration_invalid(IDENTIFIER, metadata))
    }
}

/// A `crc32c` codec implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Crc32cCodec;

impl Crc32cCodec {
    /// Create a new `crc32c` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BytesToBytesCodecTraits for Crc32cCodec {
    fn create_metadata(&self) -> Metadata {
        Metadata::new(IDENTIFIER)
    }

    fn encode(&self, mut decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let checksum = crc32c::crc32c(&decoded_value).to_le_bytes();
        decoded_value.reserve_exact(checksum.len());
        decoded_value.extend(&checksum);
        Ok(decoded_value)
    }

    fn decode(&self, mut encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        if encoded_value.len() < CHECKSUM_SIZE {
            return Err(CodecError::Other(
                "CRC32C checksum decoder expects a 32 bit input".to_string(),
            ));
        }
        let decoded_len = encoded_value.len() - CHECKSUM_SIZE;
        if global_config().validate_checksums() {
            let checksum = crc32c::crc32c(&encoded_value[..decoded_len]).to_le_bytes();
            if checksum != encoded_value[decoded_len..] {
                return Err(CodecError::InvalidChecksum);
            }
        }
        encoded_value.truncate(decoded_len);
        Ok(encoded_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_crc32c_round_trip() {
        let bytes: Vec<u8> = (0..6).collect();
        let encoded = Crc32cCodec.encode(bytes.clone()).unwrap();
        assert_eq!(encoded.len(), bytes.len() + CHECKSUM_SIZE);
        assert_eq!(Crc32cCodec.decode(encoded).unwrap(), bytes);
    }

    #[test]
    fn codec_crc32c_known_value() {
        // RFC 3720 B.4 test vector: 32 bytes of zeros
        let encoded = Crc32cCodec.encode(vec![0; 32]).unwrap();
        assert_eq!(&encoded[32..], &0x8a91_36aa_u32.to_le_bytes());
    }

    #[test]
    fn codec_crc32c_invalid() {
        let mut encoded = Crc32cCodec.encode(vec![1, 2, 3]).unwrap();
        encoded[0] = 0;
        assert!(matches!(
            Crc32cCodec.decode(encoded),
            Err(CodecError::InvalidChecksum)
        ));
        assert!(Crc32cCodec.decode(vec![1, 2]).is_err());
    }

    #[test]
    fn codec_crc32c_configuration() {
        let metadata: Metadata =
            serde_json::from_str(r#"{"name":"crc32c","configuration":{"x":1}}"#).unwrap();
        assert!(create_codec_crc32c(&metadata).is_err());
    }
}
