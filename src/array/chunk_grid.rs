//! The regular chunk grid.
//!
//! An array is partitioned into chunks of a fixed shape.
//! Chunks on the upper boundary of an array (edge chunks) are truncated to the array bounds.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    array::{ArrayIndices, ArrayShape},
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
    metadata::Metadata,
    plugin::PluginCreateError,
};

const IDENTIFIER: &str = "regular";

/// Configuration parameters for a `regular` chunk grid.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[serde(deny_unknown_fields)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct RegularChunkGridConfiguration {
    /// The chunk shape.
    pub chunk_shape: ArrayShape,
}

/// An invalid chunk shape.
#[derive(Debug, Error)]
#[error("chunk shape {0:?} is invalid, every dimension must be non-zero")]
pub struct InvalidChunkShapeError(ArrayShape);

/// A `regular` chunk grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularChunkGrid {
    chunk_shape: ArrayShape,
}

impl RegularChunkGrid {
    /// Create a new regular chunk grid with chunk shape `chunk_shape`.
    ///
    /// # Errors
    /// Returns [`InvalidChunkShapeError`] if any dimension of `chunk_shape` is zero.
    pub fn new(chunk_shape: ArrayShape) -> Result<Self, InvalidChunkShapeError> {
        if chunk_shape.contains(&0) {
            Err(InvalidChunkShapeError(chunk_shape))
        } else {
            Ok(Self { chunk_shape })
        }
    }

    /// Create a regular chunk grid from `regular` chunk grid metadata.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the metadata is not a valid `regular` chunk grid.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, PluginCreateError> {
        if metadata.name() != IDENTIFIER {
            return Err(PluginCreateError::Unsupported {
                name: metadata.name().to_string(),
                plugin_type: "chunk grid",
            });
        }
        let configuration: RegularChunkGridConfiguration = metadata
            .to_configuration()
            .map_err(|_| PluginCreateError::metadata_invalid(IDENTIFIER, "chunk grid", metadata))?;
        Self::new(configuration.chunk_shape)
            .map_err(|_| PluginCreateError::metadata_invalid(IDENTIFIER, "chunk grid", metadata))
    }

    /// Create the metadata of the chunk grid.
    #[must_use]
    pub fn create_metadata(&self) -> Metadata {
        let mut configuration = serde_json::Map::new();
        configuration.insert(
            "chunk_shape".to_string(),
            serde_json::Value::from(self.chunk_shape.clone()),
        );
        Metadata::new_with_configuration(IDENTIFIER, configuration)
    }

    /// Return the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Return the dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.chunk_shape.len()
    }

    /// Return the number of chunks along each dimension of an array with shape `array_shape`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `array_shape` does not match the grid dimensionality.
    pub fn grid_shape(&self, array_shape: &[u64]) -> Result<ArrayShape, IncompatibleDimensionalityError> {
        self.check_dimensionality(array_shape.len())?;
        Ok(std::iter::zip(array_shape, &self.chunk_shape)
            .map(|(a, s)| a.div_ceil(*s))
            .collect())
    }

    /// Return the origin (first element) of the chunk at `chunk_indices`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `chunk_indices` does not match the grid dimensionality.
    pub fn chunk_origin(&self, chunk_indices: &[u64]) -> Result<ArrayIndices, IncompatibleDimensionalityError> {
        self.check_dimensionality(chunk_indices.len())?;
        Ok(std::iter::zip(chunk_indices, &self.chunk_shape)
            .map(|(i, s)| i * s)
            .collect())
    }

    /// Return the grid indices of the chunk holding the element at `array_indices`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `array_indices` does not match the grid dimensionality.
    pub fn chunk_indices_of(&self, array_indices: &[u64]) -> Result<ArrayIndices, IncompatibleDimensionalityError> {
        self.check_dimensionality(array_indices.len())?;
        Ok(std::iter::zip(array_indices, &self.chunk_shape)
            .map(|(i, s)| i / s)
            .collect())
    }

    /// Return the region of an array with shape `array_shape` covered by the chunk at `chunk_indices`.
    ///
    /// Edge chunks are truncated to the array bounds.
    /// Returns [`None`] if the chunk is outside of the chunk grid.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `chunk_indices` or `array_shape` does not match the grid dimensionality.
    pub fn chunk_subset(
        &self,
        chunk_indices: &[u64],
        array_shape: &[u64],
    ) -> Result<Option<ArraySubset>, IncompatibleDimensionalityError> {
        let grid_shape = self.grid_shape(array_shape)?;
        self.check_dimensionality(chunk_indices.len())?;
        if std::iter::zip(chunk_indices, &grid_shape).any(|(i, g)| i >= g) {
            return Ok(None);
        }
        let start = self.chunk_origin(chunk_indices)?;
        let shape = itertools::izip!(&start, &self.chunk_shape, array_shape)
            .map(|(start, chunk, array)| (*chunk).min(array - start))
            .collect();
        Ok(Some(ArraySubset::new_with_start_shape(start, shape)?))
    }

    /// Return the chunk grid indices of the chunks overlapping `array_subset`.
    ///
    /// The result is a region of the chunk grid, which is empty if `array_subset` is empty.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `array_subset` does not match the grid dimensionality.
    pub fn chunks_in_array_subset(
        &self,
        array_subset: &ArraySubset,
    ) -> Result<ArraySubset, IncompatibleDimensionalityError> {
        self.check_dimensionality(array_subset.dimensionality())?;
        if array_subset.num_elements() == 0 {
            return Ok(ArraySubset::new_with_shape(vec![0; self.dimensionality()]));
        }
        let start: ArrayIndices = std::iter::zip(array_subset.start(), &self.chunk_shape)
            .map(|(i, s)| i / s)
            .collect();
        let end_exc: ArrayIndices = std::iter::zip(array_subset.end_exc(), &self.chunk_shape)
            .map(|(i, s)| i.div_ceil(*s))
            .collect();
        ArraySubset::new_with_start_end_exc(start, &end_exc)
    }

    fn check_dimensionality(&self, dimensionality: usize) -> Result<(), IncompatibleDimensionalityError> {
        if dimensionality == self.dimensionality() {
            Ok(())
        } else {
            Err(IncompatibleDimensionalityError::new(
                dimensionality,
                self.dimensionality(),
            ))
        }
    }
}
