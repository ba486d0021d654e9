use std::iter::FusedIterator;

use crate::array::{ArrayIndices, ArrayShape};

use super::ArraySubset;

/// Convert a linear (row-major) element index into an index for an array of `shape`.
#[must_use]
pub fn unravel_index(mut index: u64, shape: &[u64]) -> ArrayIndices {
    let mut indices = vec![0; shape.len()];
    for (indices_i, &dim) in indices.iter_mut().zip(shape).rev() {
        *indices_i = index % dim;
        index /= dim;
    }
    indices
}

/// Convert an index of an array of `shape` into a linear (row-major) element index.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    indices
        .iter()
        .zip(shape)
        .fold(0, |index, (&indices_i, &dim)| index * dim + indices_i)
}

/// An iterator over the indices in an array subset.
///
/// Iterates over the last dimension fastest (i.e. C-contiguous order).
/// For example, consider a 4x3 array with element indices
/// ```text
/// (0, 0)  (0, 1)  (0, 2)
/// (1, 0)  (1, 1)  (1, 2)
/// (2, 0)  (2, 1)  (2, 2)
/// (3, 0)  (3, 1)  (3, 2)
/// ```
/// An iterator with an array subset corresponding to the lower right 2x2 region will produce `[(2, 1), (2, 2), (3, 1), (3, 2)]`.
pub struct IndicesIterator {
    subset: ArraySubset,
    index: u64,
    length: u64,
}

impl IndicesIterator {
    pub(super) fn new(subset: ArraySubset) -> Self {
        let length = subset.num_elements();
        Self {
            subset,
            index: 0,
            length,
        }
    }
}

impl Iterator for IndicesIterator {
    type Item = ArrayIndices;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.length {
            return None;
        }
        let mut indices = unravel_index(self.index, self.subset.shape());
        for (indices_i, start) in indices.iter_mut().zip(self.subset.start()) {
            *indices_i += start;
        }
        self.index += 1;
        Some(indices)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.length - self.index).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for IndicesIterator {}

impl FusedIterator for IndicesIterator {}

/// An iterator over the contiguous runs of an array subset within an array.
///
/// Each item is the linearised index of the first element of a run and the number of elements in the run.
/// Trailing dimensions which the subset spans entirely are merged into a single run.
pub struct ContiguousLinearisedIndicesIterator {
    outer: IndicesIterator,
    inner_start: ArrayIndices,
    array_shape: ArrayShape,
    contiguous_elements: u64,
}

impl ContiguousLinearisedIndicesIterator {
    pub(super) fn new(subset: &ArraySubset, array_shape: &[u64]) -> Self {
        let dimensionality = subset.dimensionality();
        let mut contiguous_elements = 1;
        let mut outer_dimensionality = dimensionality;
        for dim in (0..dimensionality).rev() {
            contiguous_elements *= subset.shape()[dim];
            outer_dimensionality = dim;
            if subset.shape()[dim] != array_shape[dim] {
                break;
            }
        }
        let outer = if contiguous_elements == 0 {
            ArraySubset::new_with_shape(vec![0])
        } else {
            ArraySubset {
                start: subset.start()[..outer_dimensionality].to_vec(),
                shape: subset.shape()[..outer_dimensionality].to_vec(),
            }
        };
        Self {
            outer: outer.indices(),
            inner_start: subset.start()[outer_dimensionality..].to_vec(),
            array_shape: array_shape.to_vec(),
            contiguous_elements,
        }
    }
}

impl Iterator for ContiguousLinearisedIndicesIterator {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let mut indices = self.outer.next()?;
        indices.extend_from_slice(&self.inner_start);
        Some((
            ravel_indices(&indices, &self.array_shape),
            self.contiguous_elements,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.outer.size_hint()
    }
}

impl ExactSizeIterator for ContiguousLinearisedIndicesIterator {}

impl FusedIterator for ContiguousLinearisedIndicesIterator {}
