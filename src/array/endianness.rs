use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::DataType;

/// The byte order of stored elements, either `big` or `little`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Little endian.
    #[display("little")]
    Little,

    /// Big endian.
    #[display("big")]
    Big,
}

impl Endianness {
    /// Return true if the endianness matches the endianness of the CPU.
    #[must_use]
    pub fn is_native(self) -> bool {
        self == NATIVE_ENDIAN
    }
}

/// The endianness of the CPU.
pub const NATIVE_ENDIAN: Endianness = if cfg!(target_endian = "big") {
    Endianness::Big
} else {
    Endianness::Little
};

/// Convert native-endian elements of `data_type` in `bytes` to or from `endianness`, in place.
pub fn reverse_endianness_if_needed(bytes: &mut [u8], data_type: DataType, endianness: Endianness) {
    let size = data_type.size();
    if size > 1 && !endianness.is_native() {
        for element in bytes.chunks_exact_mut(size) {
            element.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endianness_serde() {
        assert_eq!(serde_json::to_string(&Endianness::Big).unwrap(), r#""big""#);
        assert_eq!(
            serde_json::from_str::<Endianness>(r#""little""#).unwrap(),
            Endianness::Little
        );
        assert!(serde_json::from_str::<Endianness>(r#""Little""#).is_err());
    }

    #[test]
    fn endianness_reverse() {
        let mut bytes = 258u16.to_ne_bytes().to_vec();
        reverse_endianness_if_needed(&mut bytes, DataType::UInt16, Endianness::Big);
        assert_eq!(bytes, 258u16.to_be_bytes());
        let mut bytes = vec![1, 2];
        reverse_endianness_if_needed(&mut bytes, DataType::UInt8, Endianness::Big);
        assert_eq!(bytes, vec![1, 2]);
    }
}
