//! The blosc bytes to bytes codec.
//!
//! Uses the [blosc](https://www.blosc.org/) container format.
//! The configuration is accepted in the Zarr V3 form (named shuffle modes) and the numcodecs and N5 form (integer shuffle modes).

use std::ffi::{c_char, c_int, c_void};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    array::codec::{
        codec_metadata, configuration_invalid, BytesToBytesCodecTraits, Codec, CodecError,
        CodecPlugin,
    },
    metadata::{n5::N5Compression, v2::CodecMetadataV2, Metadata, MetadataConfiguration},
    plugin::PluginCreateError,
};

const IDENTIFIER: &str = "blosc";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_blosc, create_codec_blosc)
}

fn is_name_blosc(name: &str) -> bool {
    name.eq(IDENTIFIER) || name.eq("numcodecs.blosc")
}

fn create_codec_blosc(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: BloscCodecConfiguration = metadata
        .to_configuration()
        .map_err(|_| configuration_invalid(IDENTIFIER, metadata))?;
    Ok(Codec::new(BloscCodec::new_with_configuration(&configuration)?))
}

/// An integer from 0 to 9 controlling the compression level.
///
/// Compression is turned off when the compression level is 0.
#[derive(Serialize, Copy, Clone, Debug, Eq, PartialEq)]
pub struct BloscCompressionLevel(u8);

impl TryFrom<u8> for BloscCompressionLevel {
    type Error = u8;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if level <= 9 {
            Ok(Self(level))
        } else {
            Err(level)
        }
    }
}

impl<'de> Deserialize<'de> for BloscCompressionLevel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let level = u8::deserialize(d)?;
        Self::try_from(level).map_err(|_| serde::de::Error::custom("clevel must be between 0 and 9"))
    }
}

/// The `blosc` shuffle mode.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Eq, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BloscShuffleMode {
    /// No shuffling.
    #[default]
    NoShuffle,
    /// Byte-wise shuffling.
    Shuffle,
    /// Bit-wise shuffling.
    BitShuffle,
}

/// The `blosc` shuffle mode in numcodecs and N5 metadata.
#[derive(Serialize_repr, Deserialize_repr, Copy, Clone, Debug, Eq, PartialEq)]
#[repr(i8)]
pub enum BloscShuffleModeNumcodecs {
    /// No shuffling.
    NoShuffle = 0,
    /// Byte-wise shuffling.
    Shuffle = 1,
    /// Bit-wise shuffling.
    BitShuffle = 2,
    /// Bit-wise shuffling for single byte elements, byte-wise shuffling otherwise.
    AutoShuffle = -1,
}

/// A shuffle mode in either metadata form.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Eq, PartialEq)]
#[serde(untagged)]
pub enum BloscShuffleConfiguration {
    /// A named shuffle mode.
    Named(BloscShuffleMode),
    /// An integer shuffle mode.
    Numcodecs(BloscShuffleModeNumcodecs),
}

impl Default for BloscShuffleConfiguration {
    fn default() -> Self {
        Self::Named(BloscShuffleMode::NoShuffle)
    }
}

/// The `blosc` compressor.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BloscCompressor {
    /// BloscLZ, the blosc default compressor.
    BloscLZ,
    /// LZ4.
    LZ4,
    /// LZ4HC, a high compression variant of LZ4.
    LZ4HC,
    /// Snappy.
    Snappy,
    /// Zlib.
    Zlib,
    /// Zstd.
    Zstd,
}

impl BloscCompressor {
    const fn as_cstr(self) -> *const u8 {
        match self {
            Self::BloscLZ => blosc_sys::BLOSC_BLOSCLZ_COMPNAME.as_ptr(),
            Self::LZ4 => blosc_sys::BLOSC_LZ4_COMPNAME.as_ptr(),
            Self::LZ4HC => blosc_sys::BLOSC_LZ4HC_COMPNAME.as_ptr(),
            Self::Snappy => blosc_sys::BLOSC_SNAPPY_COMPNAME.as_ptr(),
            Self::Zlib => blosc_sys::BLOSC_ZLIB_COMPNAME.as_ptr(),
            Self::Zstd => blosc_sys::BLOSC_ZSTD_COMPNAME.as_ptr(),
        }
    }
}

/// Configuration parameters for the `blosc` codec.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct BloscCodecConfiguration {
    /// The compressor.
    pub cname: BloscCompressor,
    /// The compression level.
    pub clevel: BloscCompressionLevel,
    /// The shuffle mode. Defaults to no shuffling.
    #[serde(default)]
    pub shuffle: BloscShuffleConfiguration,
    /// The element size in bytes, required if shuffling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typesize: Option<usize>,
    /// The compression block size. Automatically determined if 0.
    #[serde(default)]
    pub blocksize: usize,
}

/// A `blosc` codec implementation.
#[derive(Clone, Debug)]
pub struct BloscCodec {
    cname: BloscCompressor,
    clevel: BloscCompressionLevel,
    shuffle: BloscShuffleMode,
    typesize: Option<usize>,
    blocksize: usize,
}

impl BloscCodec {
    /// Create a new `blosc` codec.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the compressor is not available, or if shuffling is enabled without a `typesize`.
    pub fn new(
        cname: BloscCompressor,
        clevel: BloscCompressionLevel,
        shuffle: BloscShuffleMode,
        typesize: Option<usize>,
        blocksize: usize,
    ) -> Result<Self, PluginCreateError> {
        if shuffle != BloscShuffleMode::NoShuffle && typesize.unwrap_or_default() == 0 {
            return Err(PluginCreateError::from(
                "typesize is a positive integer required if shuffling is enabled.",
            ));
        }

        // Check that the compressor is available
        let support = unsafe {
            blosc_sys::blosc_get_complib_info(
                cname.as_cstr().cast::<c_char>(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if support < 0 {
            return Err(PluginCreateError::from(format!(
                "blosc compressor {cname:?} is not supported."
            )));
        }

        Ok(Self {
            cname,
            clevel,
            shuffle,
            typesize,
            blocksize,
        })
    }

    /// Create a new `blosc` codec from configuration.
    ///
    /// An automatic numcodecs shuffle resolves to bit-wise shuffling for single byte elements and byte-wise shuffling otherwise.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the configuration is not supported.
    pub fn new_with_configuration(configuration: &BloscCodecConfiguration) -> Result<Self, PluginCreateError> {
        let shuffle = match configuration.shuffle {
            BloscShuffleConfiguration::Named(shuffle) => shuffle,
            BloscShuffleConfiguration::Numcodecs(shuffle) => match shuffle {
                BloscShuffleModeNumcodecs::NoShuffle => BloscShuffleMode::NoShuffle,
                BloscShuffleModeNumcodecs::Shuffle => BloscShuffleMode::Shuffle,
                BloscShuffleModeNumcodecs::BitShuffle => BloscShuffleMode::BitShuffle,
                BloscShuffleModeNumcodecs::AutoShuffle => {
                    if configuration.typesize == Some(1) {
                        BloscShuffleMode::BitShuffle
                    } else {
                        BloscShuffleMode::Shuffle
                    }
                }
            },
        };
        Self::new(
            configuration.cname,
            configuration.clevel,
            shuffle,
            configuration.typesize,
            configuration.blocksize,
        )
    }

    const fn shuffle_numcodecs(&self) -> BloscShuffleModeNumcodecs {
        match self.shuffle {
            BloscShuffleMode::NoShuffle => BloscShuffleModeNumcodecs::NoShuffle,
            BloscShuffleMode::Shuffle => BloscShuffleModeNumcodecs::Shuffle,
            BloscShuffleMode::BitShuffle => BloscShuffleModeNumcodecs::BitShuffle,
        }
    }

    fn numcodecs_configuration(&self) -> MetadataConfiguration {
        let mut configuration = MetadataConfiguration::new();
        configuration.insert("cname".to_string(), serde_json::json!(self.cname));
        configuration.insert("clevel".to_string(), self.clevel.0.into());
        configuration.insert(
            "shuffle".to_string(),
            serde_json::json!(self.shuffle_numcodecs()),
        );
        configuration.insert("blocksize".to_string(), self.blocksize.into());
        configuration
    }
}

impl BytesToBytesCodecTraits for BloscCodec {
    fn create_metadata(&self) -> Metadata {
        codec_metadata(
            IDENTIFIER,
            &BloscCodecConfiguration {
                cname: self.cname,
                clevel: self.clevel,
                shuffle: BloscShuffleConfiguration::Named(self.shuffle),
                typesize: self.typesize,
                blocksize: self.blocksize,
            },
        )
    }

    fn create_metadata_v2(&self) -> CodecMetadataV2 {
        CodecMetadataV2 {
            id: IDENTIFIER.to_string(),
            configuration: self.numcodecs_configuration(),
        }
    }

    fn create_metadata_n5(&self) -> Option<N5Compression> {
        let mut configuration = self.numcodecs_configuration();
        configuration.insert("nthreads".to_string(), 1.into());
        Some(N5Compression::new(IDENTIFIER, configuration))
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        blosc_compress_bytes(
            &decoded_value,
            self.clevel,
            self.shuffle,
            self.typesize.unwrap_or(1),
            self.cname,
            self.blocksize,
        )
    }

    fn decode(&self, encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let destsize = blosc_validate(&encoded_value)
            .ok_or_else(|| CodecError::from("blosc encoded value is invalid"))?;
        blosc_decompress_bytes(&encoded_value, destsize)
    }
}

fn blosc_compress_bytes(
    src: &[u8],
    clevel: BloscCompressionLevel,
    shuffle: BloscShuffleMode,
    typesize: usize,
    compressor: BloscCompressor,
    blocksize: usize,
) -> Result<Vec<u8>, CodecError> {
    let destsize = src.len() + blosc_sys::BLOSC_MAX_OVERHEAD as usize;
    let mut dest: Vec<u8> = Vec::with_capacity(destsize);
    let doshuffle: c_int = match shuffle {
        BloscShuffleMode::NoShuffle => 0,
        BloscShuffleMode::Shuffle => 1,
        BloscShuffleMode::BitShuffle => 2,
    };
    let written = unsafe {
        blosc_sys::blosc_compress_ctx(
            c_int::from(clevel.0),
            doshuffle,
            std::cmp::max(1, typesize),
            src.len(),
            src.as_ptr().cast::<c_void>(),
            dest.as_mut_ptr().cast::<c_void>(),
            destsize,
            compressor.as_cstr().cast::<c_char>(),
            blocksize,
            1,
        )
    };
    if written > 0 {
        #[allow(clippy::cast_sign_loss)]
        let written = written as usize;
        // SAFETY: blosc initialised `written` <= `destsize` bytes
        unsafe { dest.set_len(written) };
        dest.shrink_to_fit();
        Ok(dest)
    } else {
        Err(CodecError::Other(format!(
            "blosc compression failed with code {written}"
        )))
    }
}

/// Validate a blosc buffer, returning its decompressed size.
fn blosc_validate(src: &[u8]) -> Option<usize> {
    let mut destsize: usize = 0;
    let valid = unsafe {
        blosc_sys::blosc_cbuffer_validate(
            src.as_ptr().cast::<c_void>(),
            src.len(),
            std::ptr::addr_of_mut!(destsize),
        )
    } == 0;
    valid.then_some(destsize)
}

fn blosc_decompress_bytes(src: &[u8], destsize: usize) -> Result<Vec<u8>, CodecError> {
    let mut dest: Vec<u8> = Vec::with_capacity(destsize);
    let written = unsafe {
        blosc_sys::blosc_decompress_ctx(
            src.as_ptr().cast::<c_void>(),
            dest.as_mut_ptr().cast::<c_void>(),
            destsize,
            1,
        )
    };
    match usize::try_from(written) {
        Ok(written) if written == destsize => {
            // SAFETY: blosc initialised `destsize` bytes
            unsafe { dest.set_len(written) };
            Ok(dest)
        }
        _ => Err(CodecError::Other(format!(
            "blosc decompression failed with code {written}"
        ))),
    }
}
