//! Shape definitions for the journal-sync framework.
//!
//! A [`Shape`] is the schema binding handed to the journal source by the
//! outside world: the base query that defines the replicated rows plus the
//! declared output properties. Schema discovery is not performed here; shapes
//! are loaded from a JSON or YAML file or built in code.

use crate::types::PropertyType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for shape operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading shape file
    #[error("Failed to read shape file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Error parsing JSON
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Property not found in shape
    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    /// Two properties share the same id
    #[error("Duplicate property id: {0}")]
    DuplicateProperty(String),
}

// ============================================================================
// Shape Types
// ============================================================================

/// A declared output property of a shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Property id, which is also the result column it is read from.
    ///
    /// Ids may be quoted (`"\"ORDER NO\""`); quotes are stripped when
    /// looking the column up.
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Declared type
    #[serde(rename = "type")]
    pub property_type: PropertyType,

    /// Whether this property is part of the row key
    #[serde(default, alias = "is_key")]
    pub is_key: bool,
}

impl Property {
    /// Create a new non-key property.
    pub fn new(id: impl Into<String>, property_type: PropertyType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            property_type,
            is_key: false,
        }
    }

    /// Create a new key property.
    pub fn key(id: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            is_key: true,
            ..Self::new(id, property_type)
        }
    }

    /// Column name to read this property from.
    pub fn column_name(&self) -> &str {
        self.id.trim_matches('"')
    }
}

/// The bound schema of a replicated query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    /// Shape id
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Base query text
    #[serde(default)]
    pub query: String,

    /// Declared output properties, in payload order
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Shape {
    /// Create a new shape.
    pub fn new(id: impl Into<String>, query: impl Into<String>, properties: Vec<Property>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            query: query.into(),
            properties,
        }
    }

    /// Load a shape from a file. Files ending in `.json` are parsed as JSON,
    /// everything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let shape = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        Ok(shape)
    }

    /// Parse a shape from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let shape: Shape = serde_yaml::from_str(yaml)?;
        shape.validate()?;
        Ok(shape)
    }

    /// Parse a shape from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let shape: Shape = serde_json::from_str(json)?;
        shape.validate()?;
        Ok(shape)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for (idx, property) in self.properties.iter().enumerate() {
            if self.properties[..idx].iter().any(|p| p.id == property.id) {
                return Err(SchemaError::DuplicateProperty(property.id.clone()));
            }
        }
        Ok(())
    }

    /// Get a property by id.
    pub fn get_property(&self, id: &str) -> Result<&Property, SchemaError> {
        self.properties
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| SchemaError::PropertyNotFound(id.to_string()))
    }

    /// Iterate over the key properties.
    pub fn key_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_key)
    }
}
