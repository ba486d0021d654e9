//! Bytes to bytes codecs.

#[cfg(feature = "blosc")]
pub mod blosc;
#[cfg(feature = "bz2")]
pub mod bz2;
pub mod crc32c;
#[cfg(feature = "gzip")]
pub mod gzip;
#[cfg(feature = "zlib")]
pub mod zlib;
#[cfg(feature = "zstd")]
pub mod zstd;

#[cfg(any(feature = "gzip", feature = "zlib"))]
mod deflate_compression_level;
#[cfg(any(feature = "gzip", feature = "zlib"))]
pub use deflate_compression_level::{DeflateCompressionLevel, DeflateCompressionLevelError};
