//! Array and group metadata documents.
//!
//! Three container formats are supported, each with its own metadata document:
//!  - [Zarr V3](v3): `zarr.json`,
//!  - [Zarr V2](v2): `.zarray` / `.zgroup` (and `.zattrs`), and
//!  - [N5](n5): `attributes.json`.
//!
//! The [`Metadata`] structure is the common currency for extension points (codecs, chunk key encodings, ...) regardless of the format a document was read from.

pub mod n5;
pub mod v2;
pub mod v3;

use derive_more::Display;
use serde::{de::DeserializeOwned, ser::SerializeMap, Deserialize, Serialize};
use thiserror::Error;

pub use self::{n5::N5ArrayMetadata, v2::ArrayMetadataV2, v3::ArrayMetadataV3};

/// A container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum ContainerFormat {
    /// Zarr V3.
    #[default]
    #[display("Zarr V3")]
    ZarrV3,
    /// Zarr V2.
    #[display("Zarr V2")]
    ZarrV2,
    /// N5.
    #[display("N5")]
    N5,
}

impl ContainerFormat {
    /// The order in which formats are probed when opening a node with no prior knowledge of its format.
    pub const DISCOVERY_ORDER: [Self; 3] = [Self::ZarrV3, Self::ZarrV2, Self::N5];
}

/// The type of a hierarchy node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum NodeType {
    /// An array.
    #[display("array")]
    Array,
    /// A group.
    #[display("group")]
    Group,
}

/// Array metadata in any supported format.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayMetadata {
    /// Zarr V3 array metadata.
    V3(ArrayMetadataV3),
    /// Zarr V2 array metadata.
    V2(ArrayMetadataV2),
    /// N5 array metadata.
    N5(N5ArrayMetadata),
}

impl ArrayMetadata {
    /// Returns the container format of the metadata.
    #[must_use]
    pub const fn format(&self) -> ContainerFormat {
        match self {
            Self::V3(_) => ContainerFormat::ZarrV3,
            Self::V2(_) => ContainerFormat::ZarrV2,
            Self::N5(_) => ContainerFormat::N5,
        }
    }
}

/// Configuration metadata.
pub type MetadataConfiguration = serde_json::Map<String, serde_json::Value>;

/// Metadata with a name and optional configuration.
///
/// Deserializes from a JSON string `"crc32c"` or a map `{"name": "gzip", "configuration": {"level": 5}}`.
#[derive(Clone, Debug)]
pub struct Metadata {
    name: String,
    configuration: Option<MetadataConfiguration>,
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        let empty = MetadataConfiguration::new();
        self.name == other.name
            && self.configuration.as_ref().unwrap_or(&empty)
                == other.configuration.as_ref().unwrap_or(&empty)
    }
}

impl std::fmt::Display for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.configuration {
            Some(configuration) => write!(
                f,
                "{} {}",
                self.name,
                serde_json::to_string(configuration).unwrap_or_default()
            ),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Serialize for Metadata {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match &self.configuration {
            Some(configuration) if !configuration.is_empty() => {
                let mut s = s.serialize_map(Some(2))?;
                s.serialize_entry("name", &self.name)?;
                s.serialize_entry("configuration", configuration)?;
                s.end()
            }
            _ => {
                let mut s = s.serialize_map(Some(1))?;
                s.serialize_entry("name", &self.name)?;
                s.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct NameConfiguration {
            name: String,
            #[serde(default)]
            configuration: Option<MetadataConfiguration>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum MetadataIntermediate {
            Name(String),
            NameConfiguration(NameConfiguration),
        }

        match MetadataIntermediate::deserialize(d).map_err(|_| {
            serde::de::Error::custom(
                r#"expected metadata "<name>" or {"name":"<name>","configuration":{}}"#,
            )
        })? {
            MetadataIntermediate::Name(name) => Ok(Self::new(&name)),
            MetadataIntermediate::NameConfiguration(NameConfiguration {
                name,
                configuration,
            }) => Ok(Self {
                name,
                configuration,
            }),
        }
    }
}

impl Metadata {
    /// Create metadata from `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            configuration: None,
        }
    }

    /// Create metadata from `name` and `configuration`.
    #[must_use]
    pub fn new_with_configuration(name: &str, configuration: MetadataConfiguration) -> Self {
        Self {
            name: name.to_string(),
            configuration: Some(configuration),
        }
    }

    /// Create metadata from `name` and a serializable configuration.
    ///
    /// # Errors
    /// Returns [`serde_json::Error`] if `configuration` does not serialize to a JSON object.
    pub fn new_with_serializable_configuration<TConfiguration: Serialize>(
        name: &str,
        configuration: &TConfiguration,
    ) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(configuration)? {
            serde_json::Value::Object(configuration) => {
                Ok(Self::new_with_configuration(name, configuration))
            }
            _ => Err(serde::ser::Error::custom(
                "the configuration cannot be serialized to a JSON object",
            )),
        }
    }

    /// Convert the configuration to a concrete configuration type.
    ///
    /// # Errors
    /// Returns a [`ConfigurationInvalidError`] if the configuration does not deserialize to `TConfiguration`.
    pub fn to_configuration<TConfiguration: DeserializeOwned>(
        &self,
    ) -> Result<TConfiguration, ConfigurationInvalidError> {
        let configuration = self.configuration.clone().unwrap_or_default();
        serde_json::from_value(serde_json::Value::Object(configuration)).map_err(|_| {
            ConfigurationInvalidError {
                name: self.name.clone(),
                configuration: self.configuration.clone(),
            }
        })
    }

    /// Returns the metadata name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the metadata configuration.
    #[must_use]
    pub const fn configuration(&self) -> Option<&MetadataConfiguration> {
        self.configuration.as_ref()
    }

    /// Returns true if the configuration is none or an empty map.
    #[must_use]
    pub fn configuration_is_none_or_empty(&self) -> bool {
        self.configuration
            .as_ref()
            .map_or(true, serde_json::Map::is_empty)
    }
}

/// An invalid configuration error.
#[derive(Debug, Error)]
#[error("{name} is unsupported, configuration: {configuration:?}")]
pub struct ConfigurationInvalidError {
    name: String,
    configuration: Option<MetadataConfiguration>,
}

/// Log and drop unrecognised fields of a metadata document.
pub(crate) fn warn_unknown_fields(document: &str, fields: &serde_json::Map<String, serde_json::Value>) {
    for name in fields.keys() {
        log::warn!("ignoring unknown field {name} in {document}");
    }
}
