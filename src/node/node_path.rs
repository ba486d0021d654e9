use derive_more::Display;
use thiserror::Error;

use crate::storage::StorePrefix;

/// A hierarchy node path, such as `/` or `/astronaut/gzip`.
///
/// A path always starts with `/`.
/// A non-root path does not end with `/` and has no empty components.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct NodePath(String);

/// An invalid node path.
#[derive(Debug, Error)]
#[error("invalid node path {0}")]
pub struct NodePathError(String);

impl NodePath {
    /// Create a new node path from `path`.
    ///
    /// # Errors
    /// Returns [`NodePathError`] if `path` is not valid according to [`NodePath::validate`].
    pub fn new(path: &str) -> Result<Self, NodePathError> {
        if Self::validate(path) {
            Ok(Self(path.to_string()))
        } else {
            Err(NodePathError(path.to_string()))
        }
    }

    /// The root node.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns true if this is the root node.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Extracts a string slice of the path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a node path.
    #[must_use]
    pub fn validate(path: &str) -> bool {
        path == "/"
            || (path.starts_with('/')
                && !path.ends_with('/')
                && path[1..]
                    .split('/')
                    .all(|name| !name.is_empty() && name != "." && name != ".."))
    }

    /// Returns the path of a child node named `name`.
    ///
    /// # Errors
    /// Returns [`NodePathError`] if `name` is empty, `.`, `..`, or contains a `/`.
    pub fn child(&self, name: &str) -> Result<Self, NodePathError> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            Err(NodePathError(name.to_string()))
        } else if self.is_root() {
            Self::new(&format!("/{name}"))
        } else {
            Self::new(&format!("{}/{name}", self.0))
        }
    }
}

impl TryFrom<&str> for NodePath {
    type Error = NodePathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<&NodePath> for StorePrefix {
    fn from(path: &NodePath) -> Self {
        if path.is_root() {
            Self::root()
        } else {
            Self::from_validated(format!("{}/", &path.as_str()[1..]))
        }
    }
}
