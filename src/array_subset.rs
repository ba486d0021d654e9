//! Array subsets.
//!
//! An [`ArraySubset`] is a hyperrectangular region of an array: a start index and a shape.
//! It is used to describe the region requested by a read, the region covered by a chunk, and the overlap between the two.
//!
//! This module also provides the byte copying used to move a region between two row-major buffers.

mod iterators;

pub use iterators::{
    ravel_indices, unravel_index, ContiguousLinearisedIndicesIterator, IndicesIterator,
};

use derive_more::Display;
use itertools::izip;
use thiserror::Error;

use crate::array::{ArrayIndices, ArrayShape};

/// An array subset.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Default)]
#[display("start {start:?} shape {shape:?}")]
pub struct ArraySubset {
    start: ArrayIndices,
    shape: ArrayShape,
}

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// An array subset does not fit in an array, or a buffer has the wrong length.
#[derive(Clone, Debug, Error)]
pub enum ArrayCopyBytesError {
    /// The subset is out of bounds of the array.
    #[error("array subset {0} is out of bounds of array shape {1:?}")]
    OutOfBounds(ArraySubset, ArrayShape),
    /// A buffer has an unexpected length.
    #[error("expected bytes to have length {expected}, got {got}")]
    InvalidBytesLength {
        /// The length of the buffer.
        got: usize,
        /// The expected length of the buffer.
        expected: u64,
    },
}

impl ArraySubset {
    /// Create a new array subset covering an entire array of `shape`.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset with `start` and `shape`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the lengths of `start` and `shape` differ.
    pub fn new_with_start_shape(
        start: ArrayIndices,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError(shape.len(), start.len()))
        }
    }

    /// Create a new array subset from an inclusive `start` and an exclusive `end`.
    ///
    /// An `end` before `start` in a dimension gives an empty dimension.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the lengths of `start` and `end` differ.
    pub fn new_with_start_end_exc(
        start: ArrayIndices,
        end: &[u64],
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() != end.len() {
            return Err(IncompatibleDimensionalityError(end.len(), start.len()));
        }
        let shape = start
            .iter()
            .zip(end)
            .map(|(start, end)| end.saturating_sub(*start))
            .collect();
        Ok(Self { start, shape })
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the exclusive end of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        izip!(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Return the number of elements of the array subset as a [`usize`].
    ///
    /// # Panics
    /// Panics if the number of elements exceeds [`usize::MAX`].
    #[must_use]
    pub fn num_elements_usize(&self) -> usize {
        usize::try_from(self.num_elements()).expect("number of elements exceeds usize::MAX")
    }

    /// Returns true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(self.end_exc(), array_shape).all(|(end, shape)| end <= *shape)
    }

    /// Return the overlap of this subset and `other`, which may be empty.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `other` differs.
    pub fn overlap(&self, other: &Self) -> Result<Self, IncompatibleDimensionalityError> {
        if other.dimensionality() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError(
                other.dimensionality(),
                self.dimensionality(),
            ));
        }
        let start: ArrayIndices = izip!(&self.start, &other.start)
            .map(|(a, b)| *a.max(b))
            .collect();
        let end: ArrayIndices = izip!(self.end_exc(), other.end_exc())
            .map(|(a, b)| a.min(b))
            .collect();
        Self::new_with_start_end_exc(start, &end)
    }

    /// Return this subset relative to `origin`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `origin` differs.
    pub fn relative_to(&self, origin: &[u64]) -> Result<Self, IncompatibleDimensionalityError> {
        if origin.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError(
                origin.len(),
                self.dimensionality(),
            ));
        }
        Ok(Self {
            start: izip!(&self.start, origin)
                .map(|(start, origin)| start.saturating_sub(*origin))
                .collect(),
            shape: self.shape.clone(),
        })
    }

    /// Returns an iterator over the indices of elements within the subset, in row-major order.
    #[must_use]
    pub fn indices(&self) -> IndicesIterator {
        IndicesIterator::new(self.clone())
    }

    /// Returns an iterator over the contiguous runs of this subset within an array of `array_shape`.
    ///
    /// # Errors
    /// Returns [`ArrayCopyBytesError::OutOfBounds`] if the subset is not within `array_shape`.
    pub fn contiguous_linearised_indices(
        &self,
        array_shape: &[u64],
    ) -> Result<ContiguousLinearisedIndicesIterator, ArrayCopyBytesError> {
        if self.inbounds(array_shape) {
            Ok(ContiguousLinearisedIndicesIterator::new(self, array_shape))
        } else {
            Err(ArrayCopyBytesError::OutOfBounds(
                self.clone(),
                array_shape.to_vec(),
            ))
        }
    }

    /// Return the bytes of this subset from `bytes`, the row-major bytes of an array of `array_shape` and `element_size`.
    ///
    /// # Errors
    /// Returns [`ArrayCopyBytesError`] if the subset is out of bounds or `bytes` has the wrong length.
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<Vec<u8>, ArrayCopyBytesError> {
        check_length(bytes.len(), array_shape.iter().product::<u64>(), element_size)?;
        let runs = self.contiguous_linearised_indices(array_shape)?;
        let mut out = Vec::with_capacity(self.num_elements_usize() * element_size);
        for (index, length) in runs {
            let start = to_usize(index) * element_size;
            out.extend_from_slice(&bytes[start..start + to_usize(length) * element_size]);
        }
        Ok(out)
    }

    /// Copy `bytes_subset`, the row-major bytes of this subset, into `bytes_array`, the row-major bytes of an array of `array_shape`.
    ///
    /// # Errors
    /// Returns [`ArrayCopyBytesError`] if the subset is out of bounds or a buffer has the wrong length.
    pub fn store_bytes(
        &self,
        bytes_subset: &[u8],
        bytes_array: &mut [u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<(), ArrayCopyBytesError> {
        check_length(bytes_subset.len(), self.num_elements(), element_size)?;
        check_length(bytes_array.len(), array_shape.iter().product::<u64>(), element_size)?;
        let mut offset = 0;
        for (index, length) in self.contiguous_linearised_indices(array_shape)? {
            let start = to_usize(index) * element_size;
            let length = to_usize(length) * element_size;
            bytes_array[start..start + length].copy_from_slice(&bytes_subset[offset..offset + length]);
            offset += length;
        }
        Ok(())
    }
}

fn check_length(got: usize, num_elements: u64, element_size: usize) -> Result<(), ArrayCopyBytesError> {
    let expected = num_elements * element_size as u64;
    if got as u64 == expected {
        Ok(())
    } else {
        Err(ArrayCopyBytesError::InvalidBytesLength { got, expected })
    }
}

/// Indices into a buffer whose length was already checked always fit in a [`usize`].
#[allow(clippy::cast_possible_truncation)]
const fn to_usize(value: u64) -> usize {
    value as usize
}

/// Copy the region `src_subset` of a `src_shape` array into the region `dst_subset` of a `dst_shape` array.
///
/// Both subsets must have the same shape.
///
/// # Errors
/// Returns [`ArrayCopyBytesError`] if a subset is out of bounds, the subset shapes differ, or a buffer has the wrong length.
pub fn copy_region(
    src: &[u8],
    src_shape: &[u64],
    src_subset: &ArraySubset,
    dst: &mut [u8],
    dst_shape: &[u64],
    dst_subset: &ArraySubset,
    element_size: usize,
) -> Result<(), ArrayCopyBytesError> {
    if src_subset.shape() != dst_subset.shape() {
        return Err(ArrayCopyBytesError::OutOfBounds(
            dst_subset.clone(),
            src_subset.shape().to_vec(),
        ));
    }
    if src_subset.num_elements() == 0 {
        return Ok(());
    }
    check_length(src.len(), src_shape.iter().product::<u64>(), element_size)?;
    check_length(dst.len(), dst_shape.iter().product::<u64>(), element_size)?;
    let mut src_runs = src_subset.contiguous_linearised_indices(src_shape)?;
    let dst_runs = dst_subset.contiguous_linearised_indices(dst_shape)?;
    // Runs differ in length between the two layouts, so both are consumed at the granularity of the shortest.
    let mut src_run = src_runs.next();
    for (mut dst_index, mut dst_length) in dst_runs {
        while dst_length > 0 {
            let Some((src_index, src_length)) = src_run.as_mut() else {
                break;
            };
            let length = dst_length.min(*src_length);
            let src_start = to_usize(*src_index) * element_size;
            let dst_start = to_usize(dst_index) * element_size;
            let bytes = to_usize(length) * element_size;
            dst[dst_start..dst_start + bytes].copy_from_slice(&src[src_start..src_start + bytes]);
            *src_index += length;
            *src_length -= length;
            dst_index += length;
            dst_length -= length;
            if *src_length == 0 {
                src_run = src_runs.next();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_subset() {
        let subset = ArraySubset::new_with_start_shape(vec![1, 1], vec![2, 2]).unwrap();
        assert_eq!(subset.end_exc(), vec![3, 3]);
        assert_eq!(subset.num_elements(), 4);
        assert!(subset.inbounds(&[3, 3]));
        assert!(!subset.inbounds(&[2, 3]));
        assert!(!subset.inbounds(&[3, 3, 1]));
        assert!(ArraySubset::new_with_start_shape(vec![1], vec![2, 2]).is_err());
        assert_eq!(subset.to_string(), "start [1, 1] shape [2, 2]");
    }

    #[test]
    fn array_subset_overlap() {
        let a = ArraySubset::new_with_start_shape(vec![0, 0], vec![4, 4]).unwrap();
        let b = ArraySubset::new_with_start_shape(vec![2, 3], vec![4, 4]).unwrap();
        let overlap = a.overlap(&b).unwrap();
        assert_eq!(overlap.start(), &[2, 3]);
        assert_eq!(overlap.shape(), &[2, 1]);
        assert_eq!(overlap.relative_to(&[2, 2]).unwrap().start(), &[0, 1]);
        let c = ArraySubset::new_with_start_shape(vec![5, 5], vec![1, 1]).unwrap();
        assert_eq!(a.overlap(&c).unwrap().num_elements(), 0);
    }

    #[test]
    fn array_subset_bytes() {
        // 4x4 array of element indices
        let array: Vec<u8> = (0..16).collect();
        let subset = ArraySubset::new_with_start_shape(vec![1, 1], vec![2, 2]).unwrap();
        let bytes = subset.extract_bytes(&array, &[4, 4], 1).unwrap();
        assert_eq!(bytes, vec![5, 6, 9, 10]);

        let mut out = vec![0u8; 16];
        subset.store_bytes(&bytes, &mut out, &[4, 4], 1).unwrap();
        assert_eq!(out[5], 5);
        assert_eq!(out[10], 10);
        assert_eq!(out[0], 0);
        assert!(subset.store_bytes(&bytes, &mut out, &[4, 3], 1).is_err());
        assert!(subset.extract_bytes(&array[1..], &[4, 4], 1).is_err());
    }

    #[test]
    fn array_subset_copy_region() {
        let src: Vec<u8> = (0..12).collect(); // 3x4
        let mut dst = vec![0u8; 8]; // 2x4
        let src_subset = ArraySubset::new_with_start_shape(vec![1, 0], vec![2, 4]).unwrap();
        let dst_subset = ArraySubset::new_with_shape(vec![2, 4]);
        copy_region(&src, &[3, 4], &src_subset, &mut dst, &[2, 4], &dst_subset, 1).unwrap();
        assert_eq!(dst, (4..12).collect::<Vec<u8>>());

        let mut dst = vec![0u8; 4]; // 2x2
        let src_subset = ArraySubset::new_with_start_shape(vec![0, 2], vec![2, 2]).unwrap();
        let dst_subset = ArraySubset::new_with_shape(vec![2, 2]);
        copy_region(&src, &[3, 4], &src_subset, &mut dst, &[2, 2], &dst_subset, 1).unwrap();
        assert_eq!(dst, vec![2, 3, 6, 7]);
    }
}
