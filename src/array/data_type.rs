//! Data types.
//!
//! Every data type is fixed width. The same names are used by Zarr V3 (`data_type`) and N5 (`dataType`),
//! while Zarr V2 uses numpy type strings (`dtype`) that also encode the byte order.

use thiserror::Error;

use super::{Endianness, FillValue};

/// A data type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// `bool` Boolean.
    Bool,
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    Int8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    Int16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    Int32,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    Int64,
    /// `uint8` Integer in `[0, 2^8-1]`.
    UInt8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    UInt16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    UInt32,
    /// `uint64` Integer in `[0, 2^64-1]`.
    UInt64,
    /// `float32` IEEE 754 single-precision floating point.
    Float32,
    /// `float64` IEEE 754 double-precision floating point.
    Float64,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An unsupported data type error.
#[derive(Debug, Error)]
#[error("data type {0} is not supported")]
pub struct UnsupportedDataTypeError(String);

/// A fill value that is incompatible with a data type.
#[derive(Debug, Error)]
#[error("fill value {1} is incompatible with data type {0}")]
pub struct IncompatibleFillValueMetadataError(DataType, serde_json::Value);

impl DataType {
    /// All supported data types.
    pub const ALL: [Self; 11] = [
        Self::Bool,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
    ];

    /// Returns the name of the data type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Returns the size of an element in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Create a data type from its name.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if `name` is not a supported data type.
    pub fn from_name(name: &str) -> Result<Self, UnsupportedDataTypeError> {
        Self::ALL
            .into_iter()
            .find(|data_type| data_type.name() == name)
            .ok_or_else(|| UnsupportedDataTypeError(name.to_string()))
    }

    /// Returns the numpy type string of the data type stored with `endianness`.
    #[must_use]
    pub fn to_v2_dtype(&self, endianness: Endianness) -> String {
        let kind = match self {
            Self::Bool => "b",
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => "i",
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 => "u",
            Self::Float32 | Self::Float64 => "f",
        };
        let byte_order = match (self.size(), endianness) {
            (1, _) => '|',
            (_, Endianness::Little) => '<',
            (_, Endianness::Big) => '>',
        };
        format!("{byte_order}{kind}{}", self.size())
    }

    /// Parse a numpy type string into a data type and the byte order of stored elements.
    ///
    /// Single byte types have no byte order.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if `dtype` is not a supported numpy type string.
    pub fn from_v2_dtype(dtype: &str) -> Result<(Self, Option<Endianness>), UnsupportedDataTypeError> {
        let err = || UnsupportedDataTypeError(dtype.to_string());
        let mut chars = dtype.chars();
        let endianness = match chars.next() {
            Some('|') => None,
            Some('<') => Some(Endianness::Little),
            Some('>') => Some(Endianness::Big),
            _ => return Err(err()),
        };
        let data_type = match chars.as_str() {
            "b1" => Self::Bool,
            "i1" => Self::Int8,
            "i2" => Self::Int16,
            "i4" => Self::Int32,
            "i8" => Self::Int64,
            "u1" => Self::UInt8,
            "u2" => Self::UInt16,
            "u4" => Self::UInt32,
            "u8" => Self::UInt64,
            "f4" => Self::Float32,
            "f8" => Self::Float64,
            _ => return Err(err()),
        };
        if data_type.size() > 1 && endianness.is_none() {
            return Err(err());
        }
        Ok((data_type, endianness))
    }

    /// Create a fill value from metadata.
    ///
    /// A `null` fill value (permitted by Zarr V2) is zero.
    ///
    /// # Errors
    /// Returns [`IncompatibleFillValueMetadataError`] if the fill value is incompatible with the data type.
    pub fn fill_value_from_metadata(
        &self,
        fill_value: &serde_json::Value,
    ) -> Result<FillValue, IncompatibleFillValueMetadataError> {
        use serde_json::Value;
        let err = || IncompatibleFillValueMetadataError(*self, fill_value.clone());
        if fill_value.is_null() {
            return Ok(FillValue::zero(*self));
        }
        let int = || fill_value.as_i64().ok_or_else(err);
        let uint = || fill_value.as_u64().ok_or_else(err);
        match self {
            Self::Bool => match fill_value {
                Value::Bool(value) => Ok(FillValue::from(*value)),
                Value::Number(number) if number.as_u64() == Some(0) => Ok(false.into()),
                Value::Number(number) if number.as_u64() == Some(1) => Ok(true.into()),
                _ => Err(err()),
            },
            Self::Int8 => Ok(i8::try_from(int()?).map_err(|_| err())?.into()),
            Self::Int16 => Ok(i16::try_from(int()?).map_err(|_| err())?.into()),
            Self::Int32 => Ok(i32::try_from(int()?).map_err(|_| err())?.into()),
            Self::Int64 => Ok(int()?.into()),
            Self::UInt8 => Ok(u8::try_from(uint()?).map_err(|_| err())?.into()),
            Self::UInt16 => Ok(u16::try_from(uint()?).map_err(|_| err())?.into()),
            Self::UInt32 => Ok(u32::try_from(uint()?).map_err(|_| err())?.into()),
            Self::UInt64 => Ok(uint()?.into()),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float32 => match fill_value {
                Value::String(string) => match string.strip_prefix("0x") {
                    Some(hex) => Ok(f32::from_bits(u32::from_str_radix(hex, 16).map_err(|_| err())?).into()),
                    None => Ok((non_finite_from_str(string).ok_or_else(err)? as f32).into()),
                },
                _ => Ok((fill_value.as_f64().ok_or_else(err)? as f32).into()),
            },
            Self::Float64 => match fill_value {
                Value::String(string) => match string.strip_prefix("0x") {
                    Some(hex) => Ok(f64::from_bits(u64::from_str_radix(hex, 16).map_err(|_| err())?).into()),
                    None => Ok(non_finite_from_str(string).ok_or_else(err)?.into()),
                },
                _ => Ok(fill_value.as_f64().ok_or_else(err)?.into()),
            },
        }
    }

    /// Create fill value metadata.
    ///
    /// Non-finite floating point values are written as `"NaN"`, `"Infinity"` or `"-Infinity"`.
    ///
    /// # Errors
    /// Returns [`IncompatibleFillValueMetadataError`] if the size of `fill_value` does not match the data type.
    pub fn metadata_fill_value(
        &self,
        fill_value: &FillValue,
    ) -> Result<serde_json::Value, IncompatibleFillValueMetadataError> {
        let bytes = fill_value.as_ne_bytes();
        let err = || {
            IncompatibleFillValueMetadataError(*self, serde_json::Value::from(bytes.to_vec()))
        };
        macro_rules! ne {
            ($type:ty) => {
                <$type>::from_ne_bytes(bytes.try_into().map_err(|_| err())?)
            };
        }
        Ok(match self {
            Self::Bool => serde_json::Value::Bool(ne!(u8) != 0),
            Self::Int8 => ne!(i8).into(),
            Self::Int16 => ne!(i16).into(),
            Self::Int32 => ne!(i32).into(),
            Self::Int64 => ne!(i64).into(),
            Self::UInt8 => ne!(u8).into(),
            Self::UInt16 => ne!(u16).into(),
            Self::UInt32 => ne!(u32).into(),
            Self::UInt64 => ne!(u64).into(),
            Self::Float32 => float_metadata(f64::from(ne!(f32))),
            Self::Float64 => float_metadata(ne!(f64)),
        })
    }
}

fn non_finite_from_str(string: &str) -> Option<f64> {
    match string {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn float_metadata(value: f64) -> serde_json::Value {
    if value.is_nan() {
        "NaN".into()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".into()
        } else {
            "-Infinity".into()
        }
    } else {
        serde_json::Number::from_f64(value).map_or(serde_json::Value::Null, Into::into)
    }
}
