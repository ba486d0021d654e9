use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A deflate compression level, an integer from 0 to 9.
#[derive(Serialize, Copy, Clone, Eq, PartialEq, Debug, Display)]
pub struct DeflateCompressionLevel(u32);

/// An invalid deflate compression level.
#[derive(Debug, Error)]
#[error("invalid compression level {0}, must be 0-9")]
pub struct DeflateCompressionLevelError(u32);

impl TryFrom<u32> for DeflateCompressionLevel {
    type Error = DeflateCompressionLevelError;

    fn try_from(level: u32) -> Result<Self, Self::Error> {
        if level <= 9 {
            Ok(Self(level))
        } else {
            Err(DeflateCompressionLevelError(level))
        }
    }
}

impl<'de> Deserialize<'de> for DeflateCompressionLevel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let level = u32::deserialize(d)?;
        Self::try_from(level).map_err(serde::de::Error::custom)
    }
}

impl DeflateCompressionLevel {
    /// Return the compression level as a [`u32`].
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}
