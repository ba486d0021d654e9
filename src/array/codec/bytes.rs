//! The `bytes` array to bytes codec.
//!
//! Serializes the elements of a chunk in row-major order with a configured byte order.

use serde::{Deserialize, Serialize};

use crate::{
    array::{endianness::reverse_endianness_if_needed, DataType, Endianness},
    metadata::Metadata,
    plugin::PluginCreateError,
};

use super::{codec_metadata, configuration_invalid, CodecError};

pub(crate) const IDENTIFIER: &str = "bytes";

/// Configuration parameters for the `bytes` codec.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct BytesCodecConfiguration {
    /// The byte order of the encoded elements.
    ///
    /// Only required for data types with more than one byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endian: Option<Endianness>,
}

/// A `bytes` codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BytesCodec {
    endian: Option<Endianness>,
}

impl BytesCodec {
    /// Create a new `bytes` codec.
    #[must_use]
    pub const fn new(endian: Option<Endianness>) -> Self {
        Self { endian }
    }

    /// Create a new `bytes` codec from metadata.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if `metadata` is not a valid `bytes` codec.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, PluginCreateError> {
        let configuration: BytesCodecConfiguration = metadata
            .to_configuration()
            .map_err(|_| configuration_invalid(IDENTIFIER, metadata))?;
        Ok(Self::new(configuration.endian))
    }

    /// Create the metadata of the codec.
    #[must_use]
    pub fn create_metadata(&self) -> Metadata {
        codec_metadata(
            IDENTIFIER,
            &BytesCodecConfiguration {
                endian: self.endian,
            },
        )
    }

    /// Return the configured endianness.
    #[must_use]
    pub const fn endian(&self) -> Option<Endianness> {
        self.endian
    }

    /// Check that the codec can serialize elements of `data_type`.
    ///
    /// # Errors
    /// Returns [`CodecError`] if `data_type` has multi-byte elements and the endianness is unset.
    pub fn validate(&self, data_type: DataType) -> Result<(), CodecError> {
        if self.endian.is_none() && data_type.size() > 1 {
            Err(CodecError::Other(format!(
                "the bytes codec requires an endianness for {data_type}"
            )))
        } else {
            Ok(())
        }
    }

    /// Encode native-endian elements of `data_type`.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the codec does not support `data_type`.
    pub fn encode(&self, mut decoded_value: Vec<u8>, data_type: DataType) -> Result<Vec<u8>, CodecError> {
        self.validate(data_type)?;
        if let Some(endian) = self.endian {
            reverse_endianness_if_needed(&mut decoded_value, data_type, endian);
        }
        Ok(decoded_value)
    }

    /// Decode elements of `data_type` to native-endian.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the codec does not support `data_type`.
    pub fn decode(&self, encoded_value: Vec<u8>, data_type: DataType) -> Result<Vec<u8>, CodecError> {
        // byte swapping is an involution
        self.encode(encoded_value, data_type)
    }
}
