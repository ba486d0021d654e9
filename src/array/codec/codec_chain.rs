//! An array to bytes codec formed from a `bytes` codec and a sequence of bytes to bytes codecs.

use crate::{
    array::{DataType, Endianness},
    metadata::Metadata,
    plugin::PluginCreateError,
};

use super::{bytes, BytesCodec, Codec, CodecError, CodecRegistry};

/// A codec chain is a `bytes` codec followed by any number of bytes to bytes codecs.
///
/// An empty bytes to bytes sequence is the uncompressed (`raw`) pipeline.
#[derive(Debug, Clone, Default)]
pub struct CodecChain {
    bytes_codec: BytesCodec,
    bytes_to_bytes: Vec<Codec>,
}

impl CodecChain {
    /// Create a new codec chain.
    #[must_use]
    pub fn new(bytes_codec: BytesCodec, bytes_to_bytes: Vec<Codec>) -> Self {
        Self {
            bytes_codec,
            bytes_to_bytes,
        }
    }

    /// Create a codec chain from a Zarr V3 list of codec metadata.
    ///
    /// A leading `bytes` codec sets the element byte order, all other codecs are created with `registry`.
    ///
    /// # Errors
    /// Returns a [`PluginCreateError`] if a codec is not registered or its configuration is invalid.
    pub fn from_metadata(metadatas: &[Metadata], registry: &CodecRegistry) -> Result<Self, PluginCreateError> {
        let (bytes_codec, metadatas) = match metadatas.split_first() {
            Some((first, rest)) if first.name() == bytes::IDENTIFIER => {
                (BytesCodec::from_metadata(first)?, rest)
            }
            _ => (BytesCodec::default(), metadatas),
        };
        Self::from_bytes_to_bytes_metadata(bytes_codec.endian(), metadatas, registry)
    }

    /// Create a codec chain from a byte order and a list of bytes to bytes codec metadata.
    ///
    /// # Errors
    /// Returns a [`PluginCreateError`] if a codec is not registered or its configuration is invalid.
    pub fn from_bytes_to_bytes_metadata(
        endian: Option<Endianness>,
        metadatas: &[Metadata],
        registry: &CodecRegistry,
    ) -> Result<Self, PluginCreateError> {
        let bytes_to_bytes = metadatas
            .iter()
            .map(|metadata| registry.create(metadata))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(BytesCodec::new(endian), bytes_to_bytes))
    }

    /// Create the Zarr V3 codec metadata of the chain.
    #[must_use]
    pub fn create_metadatas(&self) -> Vec<Metadata> {
        std::iter::once(self.bytes_codec.create_metadata())
            .chain(self.bytes_to_bytes.iter().map(|codec| codec.create_metadata()))
            .collect()
    }

    /// Return the `bytes` codec.
    #[must_use]
    pub const fn bytes_codec(&self) -> &BytesCodec {
        &self.bytes_codec
    }

    /// Return the bytes to bytes codecs.
    #[must_use]
    pub fn bytes_to_bytes_codecs(&self) -> &[Codec] {
        &self.bytes_to_bytes
    }

    /// Encode native-endian elements of `data_type`.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    pub fn encode(&self, decoded_value: Vec<u8>, data_type: DataType) -> Result<Vec<u8>, CodecError> {
        let mut value = self.bytes_codec.encode(decoded_value, data_type)?;
        for codec in &self.bytes_to_bytes {
            value = codec.encode(value)?;
        }
        Ok(value)
    }

    /// Decode to native-endian elements of `data_type`.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    pub fn decode(&self, encoded_value: Vec<u8>, data_type: DataType) -> Result<Vec<u8>, CodecError> {
        let mut value = encoded_value;
        for codec in self.bytes_to_bytes.iter().rev() {
            value = codec.decode(value)?;
        }
        self.bytes_codec.decode(value, data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_chain_raw() {
        let chain = CodecChain::new(BytesCodec::new(Some(Endianness::Big)), vec![]);
        let bytes = 1u16.to_ne_bytes().to_vec();
        let encoded = chain.encode(bytes.clone(), DataType::UInt16).unwrap();
        assert_eq!(encoded, vec![0, 1]);
        assert_eq!(chain.decode(encoded, DataType::UInt16).unwrap(), bytes);
        assert_eq!(chain.create_metadatas().len(), 1);
    }

    #[test]
    fn codec_chain_crc32c() {
        let registry = CodecRegistry::default();
        let metadatas: Vec<Metadata> =
            serde_json::from_str(r#"[{"name":"bytes"},{"name":"crc32c"},"crc32c"]"#).unwrap();
        let chain = CodecChain::from_metadata(&metadatas, &registry).unwrap();
        assert_eq!(chain.bytes_to_bytes_codecs().len(), 2);
        let encoded = chain.encode(vec![1, 2, 3], DataType::UInt8).unwrap();
        assert_eq!(encoded.len(), 3 + 4 + 4);
        assert_eq!(chain.decode(encoded, DataType::UInt8).unwrap(), vec![1, 2, 3]);
    }

    #[cfg(all(feature = "gzip", feature = "zstd"))]
    #[test]
    fn codec_chain_order() {
        let registry = CodecRegistry::default();
        let metadatas: Vec<Metadata> = serde_json::from_str(
            r#"[{"name":"bytes","configuration":{"endian":"little"}},
                {"name":"gzip","configuration":{"level":5}},
                {"name":"zstd","configuration":{"level":1,"checksum":false}}]"#,
        )
        .unwrap();
        let chain = CodecChain::from_metadata(&metadatas, &registry).unwrap();
        let bytes: Vec<u8> = (0..1000u32).flat_map(u32::to_ne_bytes).collect();
        let encoded = chain.encode(bytes.clone(), DataType::UInt32).unwrap();
        // the outermost codec is zstd
        assert_eq!(&encoded[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
        assert_eq!(chain.decode(encoded, DataType::UInt32).unwrap(), bytes);
        assert_eq!(chain.create_metadatas(), metadatas);
    }

    #[test]
    fn codec_chain_unsupported() {
        let metadatas = vec![Metadata::new("transpose")];
        assert!(matches!(
            CodecChain::from_metadata(&metadatas, &CodecRegistry::default()),
            Err(PluginCreateError::Unsupported { .. })
        ));
    }
}
