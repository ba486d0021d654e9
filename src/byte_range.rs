//! Byte ranges.
//!
//! A [`ByteRange`] addresses part of a stored value relative to its start or its end.
//! Sharded reads use a suffix range to fetch a shard index and prefix ranges to fetch member chunks.

use std::ops::Range;

use thiserror::Error;

/// A byte offset.
pub type ByteOffset = u64;

/// A byte length.
pub type ByteLength = u64;

/// A byte range.
///
/// A missing length means every byte after the offset (or before it, for [`ByteRange::FromEnd`]).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ByteRange {
    /// A range starting `offset` bytes from the start, with an optional length.
    FromStart(ByteOffset, Option<ByteLength>),
    /// A range ending `offset` bytes before the end, with an optional length.
    FromEnd(ByteOffset, Option<ByteLength>),
}

/// A byte range that does not fit in a value of the given size.
#[derive(Copy, Clone, Debug, Error)]
#[error("invalid byte range {0} for bytes of length {1}")]
pub struct InvalidByteRangeError(ByteRange, u64);

impl ByteRange {
    /// Returns the start of the range in a value of `size` bytes.
    #[must_use]
    pub fn start(&self, size: u64) -> u64 {
        match self {
            Self::FromStart(offset, _) => *offset,
            Self::FromEnd(offset, length) => {
                length.map_or(0, |length| size.saturating_sub(offset + length))
            }
        }
    }

    /// Returns the exclusive end of the range in a value of `size` bytes.
    #[must_use]
    pub fn end(&self, size: u64) -> u64 {
        match self {
            Self::FromStart(offset, length) => length.map_or(size, |length| offset + length),
            Self::FromEnd(offset, _) => size.saturating_sub(*offset),
        }
    }

    /// Returns the length of the range in a value of `size` bytes.
    #[must_use]
    pub fn length(&self, size: u64) -> u64 {
        self.end(size).saturating_sub(self.start(size))
    }

    /// Returns the range in a value of `size` bytes.
    ///
    /// # Errors
    /// Returns [`InvalidByteRangeError`] if the range does not fit in `size` bytes.
    pub fn to_range(&self, size: u64) -> Result<Range<usize>, InvalidByteRangeError> {
        let (Self::FromStart(offset, length) | Self::FromEnd(offset, length)) = *self;
        let err = || InvalidByteRangeError(*self, size);
        if offset.checked_add(length.unwrap_or(0)).ok_or_else(err)? > size {
            return Err(err());
        }
        let start = usize::try_from(self.start(size)).map_err(|_| err())?;
        let end = usize::try_from(self.end(size)).map_err(|_| err())?;
        Ok(start..end)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FromStart(offset, length) => {
                write!(f, "{offset}..")?;
                if let Some(length) = length {
                    write!(f, "{}", offset + length)?;
                }
                Ok(())
            }
            Self::FromEnd(offset, length) => {
                if let Some(length) = length {
                    write!(f, "-{}", offset + length)?;
                }
                write!(f, "..-{offset}")
            }
        }
    }
}

/// Extract `byte_ranges` from `bytes`.
///
/// # Errors
/// Returns [`InvalidByteRangeError`] if any byte range is out of bounds.
pub fn extract_byte_ranges(
    bytes: &[u8],
    byte_ranges: &[ByteRange],
) -> Result<Vec<Vec<u8>>, InvalidByteRangeError> {
    let size = bytes.len() as u64;
    byte_ranges
        .iter()
        .map(|byte_range| Ok(bytes[byte_range.to_range(size)?].to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_ranges() {
        let byte_range = ByteRange::FromStart(1, None);
        assert_eq!(byte_range.to_range(10).unwrap(), 1..10);
        assert_eq!(byte_range.length(10), 9);

        let byte_range = ByteRange::FromEnd(1, None);
        assert_eq!(byte_range.to_range(10).unwrap(), 0..9);

        let byte_range = ByteRange::FromEnd(0, Some(4));
        assert_eq!(byte_range.to_range(10).unwrap(), 6..10);
        assert_eq!(byte_range.length(10), 4);

        assert!(ByteRange::FromStart(1, Some(5)).to_range(6).is_ok());
        assert!(ByteRange::FromStart(1, Some(5)).to_range(2).is_err());
        assert!(ByteRange::FromEnd(1, Some(5)).to_range(2).is_err());
    }

    #[test]
    fn byte_ranges_extract() {
        let bytes = extract_byte_ranges(
            &[1, 2, 3, 4],
            &[ByteRange::FromStart(1, Some(2)), ByteRange::FromEnd(0, Some(1))],
        )
        .unwrap();
        assert_eq!(bytes, vec![vec![2, 3], vec![4]]);
        let err = extract_byte_ranges(&[1, 2, 3], &[ByteRange::FromStart(1, Some(4))]).unwrap_err();
        assert_eq!(err.to_string(), "invalid byte range 1..5 for bytes of length 3");
    }

    #[test]
    fn byte_range_display() {
        assert_eq!(ByteRange::FromStart(5, Some(2)).to_string(), "5..7");
        assert_eq!(ByteRange::FromEnd(5, None).to_string(), "..-5");
        assert_eq!(ByteRange::FromEnd(5, Some(2)).to_string(), "-7..-5");
    }
}
