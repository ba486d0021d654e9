use derive_more::{Display, From};
use thiserror::Error;

use super::StoreKey;

/// A store prefix: the empty root prefix, or a valid key followed by `/`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct StorePrefix(String);

/// An invalid store prefix.
#[derive(Debug, Error, From)]
#[error("invalid store prefix {0}")]
pub struct StorePrefixError(String);

impl StorePrefix {
    /// Create a new store prefix from `prefix`.
    ///
    /// # Errors
    /// Returns [`StorePrefixError`] if `prefix` is not valid according to [`StorePrefix::validate`].
    pub fn new(prefix: impl Into<String>) -> Result<Self, StorePrefixError> {
        let prefix = prefix.into();
        if Self::validate(&prefix) {
            Ok(Self(prefix))
        } else {
            Err(StorePrefixError(prefix))
        }
    }

    pub(crate) fn from_validated(prefix: String) -> Self {
        debug_assert!(Self::validate(&prefix), "{prefix}");
        Self(prefix)
    }

    /// The root prefix.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Extracts a string slice of the prefix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a prefix.
    #[must_use]
    pub fn validate(prefix: &str) -> bool {
        prefix.is_empty()
            || prefix
                .strip_suffix('/')
                .is_some_and(StoreKey::validate)
    }

    /// Returns the key formed by appending `suffix` to this prefix.
    ///
    /// # Errors
    /// Returns a [`StoreKeyError`](super::StoreKeyError) if the result is not a valid key.
    pub fn key(&self, suffix: &str) -> Result<StoreKey, super::StoreKeyError> {
        StoreKey::new(format!("{}{suffix}", self.0))
    }
}

impl TryFrom<&str> for StorePrefix {
    type Error = StorePrefixError;

    fn try_from(prefix: &str) -> Result<Self, StorePrefixError> {
        Self::new(prefix)
    }
}
