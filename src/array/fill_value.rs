//! Fill values.
//!
//! The fill value of an array is the value of every element of a chunk that has never been written.

use derive_more::Display;

use super::DataType;

/// A fill value: the native-endian bytes of one element.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("{_0:?}")]
pub struct FillValue(Vec<u8>);

macro_rules! impl_fill_value_from {
    ($($type:ty),*) => {
        $(
            impl From<$type> for FillValue {
                fn from(value: $type) -> Self {
                    Self(value.to_ne_bytes().to_vec())
                }
            }
        )*
    };
}

impl_fill_value_from!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl From<bool> for FillValue {
    fn from(value: bool) -> Self {
        Self(vec![u8::from(value)])
    }
}

impl FillValue {
    /// Create a new fill value composed of `bytes`.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Create the all-zero fill value of `data_type`.
    #[must_use]
    pub fn zero(data_type: DataType) -> Self {
        Self(vec![0; data_type.size()])
    }

    /// Returns the size in bytes of the fill value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return the native-endian bytes of the fill value.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the bytes of `num_elements` elements equal to the fill value.
    #[must_use]
    pub fn repeat(&self, num_elements: usize) -> Vec<u8> {
        self.0.repeat(num_elements)
    }

    /// Returns true if every element of `bytes` equals the fill value.
    #[must_use]
    pub fn equals_all(&self, bytes: &[u8]) -> bool {
        !self.0.is_empty()
            && bytes.len() % self.0.len() == 0
            && bytes.chunks_exact(self.0.len()).all(|element| element == self.0)
    }
}
