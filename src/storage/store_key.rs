use derive_more::{Display, From};
use thiserror::Error;

use super::StorePrefix;

/// A store key, such as `gzip/c/0/0/1` or `raw/.zarray`.
///
/// Components are separated by `/`.
/// A key is never empty, never starts or ends with `/`, and has no empty, `.` or `..` components.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct StoreKey(String);

/// An invalid store key.
#[derive(Debug, From, Error)]
#[error("invalid store key {0}")]
pub struct StoreKeyError(String);

/// A list of [`StoreKey`].
pub type StoreKeys = Vec<StoreKey>;

impl StoreKey {
    /// Create a new store key from `key`.
    ///
    /// # Errors
    /// Returns [`StoreKeyError`] if `key` is not valid according to [`StoreKey::validate()`].
    pub fn new(key: impl Into<String>) -> Result<Self, StoreKeyError> {
        let key = key.into();
        if Self::validate(&key) {
            Ok(Self(key))
        } else {
            Err(StoreKeyError(key))
        }
    }

    pub(crate) fn from_validated(key: String) -> Self {
        debug_assert!(Self::validate(&key), "{key}");
        Self(key)
    }

    /// Extracts a string slice of the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a key.
    #[must_use]
    pub fn validate(key: &str) -> bool {
        !key.is_empty()
            && key
                .split('/')
                .all(|component| !component.is_empty() && component != "." && component != "..")
    }

    /// Returns true if the key has prefix `prefix`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &StorePrefix) -> bool {
        self.0.starts_with(prefix.as_str())
    }

    /// Returns the key with `prefix` removed, if the key has that prefix.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &StorePrefix) -> Option<&str> {
        self.0.strip_prefix(prefix.as_str())
    }

    /// Returns the parent prefix of this key.
    #[must_use]
    pub fn parent(&self) -> StorePrefix {
        match self.0.rfind('/') {
            Some(position) => StorePrefix::from_validated(self.0[..=position].to_string()),
            None => StorePrefix::root(),
        }
    }
}

impl TryFrom<&str> for StoreKey {
    type Error = StoreKeyError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_key() {
        assert!(StoreKey::new("a").is_ok());
        assert_eq!(StoreKey::new("a").unwrap().to_string(), "a");
        assert!(StoreKey::new("").is_err());
        assert!(StoreKey::new("a/").is_err());
        assert_eq!(
            StoreKey::new("a/").unwrap_err().to_string(),
            "invalid store key a/"
        );
        assert!(StoreKey::new("/a").is_err());
        assert!(StoreKey::new("a//b").is_err());
        assert!(StoreKey::new("a/../b").is_err());
        assert!(StoreKey::new("raw/.zarray").is_ok());
    }

    #[test]
    fn store_key_parent() {
        assert_eq!(
            StoreKey::new("a/b").unwrap().parent(),
            StorePrefix::new("a/").unwrap()
        );
        assert_eq!(StoreKey::new("a").unwrap().parent(), StorePrefix::root());
        let key = StoreKey::new("gzip/c/1/2").unwrap();
        let prefix = StorePrefix::new("gzip/").unwrap();
        assert!(key.has_prefix(&prefix));
        assert_eq!(key.strip_prefix(&prefix), Some("c/1/2"));
    }
}
