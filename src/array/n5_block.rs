//! N5 data blocks.
//!
//! Every N5 chunk (a block) starts with a big-endian header:
//!  - the block mode (`u16`): 0 for a default block, 1 for a varlength block,
//!  - the number of dimensions (`u16`),
//!  - the block shape (`u32` per dimension) in N5 (reversed) dimension order, and
//!  - for varlength blocks, the number of elements (`u32`).
//!
//! The encoded payload follows the header.
//! Edge blocks record their truncated shape in the header.

use thiserror::Error;

use crate::array::ArrayShape;

/// The N5 block mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum N5BlockMode {
    /// A block with as many elements as its shape.
    Default,
    /// A block with an explicit number of elements.
    VarLength {
        /// The number of elements.
        num_elements: u32,
    },
}

/// An N5 block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct N5BlockHeader {
    mode: N5BlockMode,
    shape: ArrayShape,
}

/// An N5 block error.
#[derive(Debug, Error)]
pub enum N5BlockError {
    /// The block is shorter than its header.
    #[error("N5 block is truncated")]
    Truncated,
    /// The block mode is not supported.
    #[error("N5 block mode {0} is not supported")]
    UnsupportedMode(u16),
    /// The block shape cannot be represented in a header.
    #[error("N5 block shape {0:?} cannot be stored in a header")]
    UnrepresentableShape(ArrayShape),
}

struct HeaderReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl HeaderReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], N5BlockError> {
        let value = self
            .bytes
            .get(self.offset..self.offset + N)
            .and_then(|value| value.try_into().ok())
            .ok_or(N5BlockError::Truncated)?;
        self.offset += N;
        Ok(value)
    }

    fn u16(&mut self) -> Result<u16, N5BlockError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, N5BlockError> {
        Ok(u32::from_be_bytes(self.take()?))
    }
}

impl N5BlockHeader {
    /// Create a default mode header for a block with `shape` in row-major (C) dimension order.
    #[must_use]
    pub fn new(shape: ArrayShape) -> Self {
        Self {
            mode: N5BlockMode::Default,
            shape,
        }
    }

    /// Return the block mode.
    #[must_use]
    pub const fn mode(&self) -> N5BlockMode {
        self.mode
    }

    /// Return the block shape in row-major (C) dimension order.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Parse the header at the start of `bytes`, returning the header and the payload.
    ///
    /// # Errors
    /// Returns [`N5BlockError`] if the header is truncated or its mode is unsupported.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), N5BlockError> {
        let mut reader = HeaderReader { bytes, offset: 0 };
        let mode = reader.u16()?;
        let ndim = reader.u16()?;
        let mut shape = (0..ndim)
            .map(|_| reader.u32().map(u64::from))
            .collect::<Result<ArrayShape, _>>()?;
        shape.reverse();
        let mode = match mode {
            0 => N5BlockMode::Default,
            1 => N5BlockMode::VarLength {
                num_elements: reader.u32()?,
            },
            mode => return Err(N5BlockError::UnsupportedMode(mode)),
        };
        Ok((Self { mode, shape }, &bytes[reader.offset..]))
    }

    /// Return the size of the encoded header in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        let varlength = match self.mode {
            N5BlockMode::Default => 0,
            N5BlockMode::VarLength { .. } => core::mem::size_of::<u32>(),
        };
        2 * core::mem::size_of::<u16>() + self.shape.len() * core::mem::size_of::<u32>() + varlength
    }

    /// Prepend the encoded header to `payload`.
    ///
    /// # Errors
    /// Returns [`N5BlockError::UnrepresentableShape`] if the dimensionality exceeds [`u16::MAX`] or a dimension exceeds [`u32::MAX`].
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>, N5BlockError> {
        let unrepresentable = || N5BlockError::UnrepresentableShape(self.shape.clone());
        let ndim = u16::try_from(self.shape.len()).map_err(|_| unrepresentable())?;
        let mut block = Vec::with_capacity(self.size() + payload.len());
        let mode: u16 = match self.mode {
            N5BlockMode::Default => 0,
            N5BlockMode::VarLength { .. } => 1,
        };
        block.extend_from_slice(&mode.to_be_bytes());
        block.extend_from_slice(&ndim.to_be_bytes());
        for dimension in self.shape.iter().rev() {
            let dimension = u32::try_from(*dimension).map_err(|_| unrepresentable())?;
            block.extend_from_slice(&dimension.to_be_bytes());
        }
        if let N5BlockMode::VarLength { num_elements } = self.mode {
            block.extend_from_slice(&num_elements.to_be_bytes());
        }
        block.extend_from_slice(payload);
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn n5_block_header() {
        let header = N5BlockHeader::new(vec![1, 21, 100]);
        let block = header.encode(&[7, 8]).unwrap();
        assert_eq!(
            block,
            vec![0, 0, 0, 3, 0, 0, 0, 100, 0, 0, 0, 21, 0, 0, 0, 1, 7, 8]
        );
        let (parsed, payload) = N5BlockHeader::parse(&block).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.size(), 16);
        assert_eq!(payload, &[7, 8]);
    }

    #[test]
    fn n5_block_varlength() {
        let block = [0, 1, 0, 1, 0, 0, 0, 4, 0, 0, 0, 2, 9, 9];
        let (header, payload) = N5BlockHeader::parse(&block).unwrap();
        assert_eq!(header.mode(), N5BlockMode::VarLength { num_elements: 2 });
        assert_eq!(header.shape(), &[4]);
        assert_eq!(payload, &[9, 9]);
    }

    #[test]
    fn n5_block_invalid() {
        assert!(matches!(
            N5BlockHeader::parse(&[0, 0, 0, 2, 0, 0]),
            Err(N5BlockError::Truncated)
        ));
        assert!(matches!(
            N5BlockHeader::parse(&[0, 2, 0, 0]),
            Err(N5BlockError::UnsupportedMode(2))
        ));
        assert!(N5BlockHeader::new(vec![1 << 32]).encode(&[]).is_err());
    }
}
