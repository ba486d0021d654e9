//! Plugins.
//!
//! A [`Plugin`] creates an object from [`Metadata`] (a name and optional configuration).
//! Codecs and chunk key encodings are plugins.
//!
//! Plugins are submitted at compile time with the [inventory] crate.
//! A registry such as [`CodecRegistry`](crate::array::codec::CodecRegistry) snapshots the submitted plugins once,
//! and at runtime the name matching function of each plugin identifies which one handles a piece of metadata.

use thiserror::Error;

use crate::metadata::Metadata;

/// A plugin.
pub struct Plugin<TPlugin> {
    identifier: &'static str,
    match_name_fn: fn(name: &str) -> bool,
    create_fn: fn(metadata: &Metadata) -> Result<TPlugin, PluginCreateError>,
}

impl<TPlugin> std::fmt::Debug for Plugin<TPlugin> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Plugin({})", self.identifier)
    }
}

/// A plugin creation error.
#[derive(Error, Debug)]
pub enum PluginCreateError {
    /// No registered plugin matches the metadata name.
    #[error("{plugin_type} {name} is not supported")]
    Unsupported {
        /// The metadata name.
        name: String,
        /// The plugin type.
        plugin_type: &'static str,
    },
    /// The plugin exists but the metadata configuration is invalid.
    #[error("{plugin_type} {identifier} is unsupported with metadata: {metadata}")]
    MetadataInvalid {
        /// The plugin identifier.
        identifier: &'static str,
        /// The plugin type.
        plugin_type: &'static str,
        /// The rejected metadata.
        metadata: Box<Metadata>,
    },
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl PluginCreateError {
    /// Create a [`PluginCreateError::MetadataInvalid`] error.
    #[must_use]
    pub fn metadata_invalid(
        identifier: &'static str,
        plugin_type: &'static str,
        metadata: &Metadata,
    ) -> Self {
        Self::MetadataInvalid {
            identifier,
            plugin_type,
            metadata: Box::new(metadata.clone()),
        }
    }
}

impl From<&str> for PluginCreateError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for PluginCreateError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

impl<TPlugin> Plugin<TPlugin> {
    /// Create a new plugin for registration.
    pub const fn new(
        identifier: &'static str,
        match_name_fn: fn(name: &str) -> bool,
        create_fn: fn(metadata: &Metadata) -> Result<TPlugin, PluginCreateError>,
    ) -> Self {
        Self {
            identifier,
            match_name_fn,
            create_fn,
        }
    }

    /// Create a `TPlugin` from `metadata`.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the plugin cannot be created from `metadata`.
    pub fn create(&self, metadata: &Metadata) -> Result<TPlugin, PluginCreateError> {
        (self.create_fn)(metadata)
    }

    /// Returns true if this plugin handles metadata named `name`.
    #[must_use]
    pub fn match_name(&self, name: &str) -> bool {
        (self.match_name_fn)(name)
    }

    /// Returns the identifier of the plugin.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        self.identifier
    }
}
