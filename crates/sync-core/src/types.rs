//! Property types for journal-sync shapes.
//!
//! This module defines `PropertyType`, the closed set of value types a shape
//! property can declare. The type is resolved once when the shape is bound to
//! its query, so row projection never inspects runtime column types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of a shape property.
///
/// The tag decides how a [`SourceValue`](crate::SourceValue) read from the
/// driver is rendered into the JSON payload of a change event:
///
/// - `String`, `Text` and `Decimal` are always rendered as JSON strings
///   (decimals keep their exact textual form)
/// - every other tag is rendered as its natural JSON value
///
/// # Serialized form
///
/// Tags are written in lower snake case (`"datetime"`, `"blob"`) and parsed
/// case-insensitively, so `"Datetime"` and `"DATETIME"` are accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PropertyType {
    /// Short character data
    String,
    /// Long character data (over 1024 characters)
    Text,
    /// Signed integer
    Integer,
    /// Floating point
    Float,
    /// Exact numeric
    Decimal,
    /// Boolean
    Bool,
    /// Date and time of day
    Datetime,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Binary data
    Blob,
}

impl PropertyType {
    /// All property types, in declaration order.
    pub const ALL: [PropertyType; 10] = [
        PropertyType::String,
        PropertyType::Text,
        PropertyType::Integer,
        PropertyType::Float,
        PropertyType::Decimal,
        PropertyType::Bool,
        PropertyType::Datetime,
        PropertyType::Date,
        PropertyType::Time,
        PropertyType::Blob,
    ];

    /// Get the string representation of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Text => "text",
            PropertyType::Integer => "integer",
            PropertyType::Float => "float",
            PropertyType::Decimal => "decimal",
            PropertyType::Bool => "bool",
            PropertyType::Datetime => "datetime",
            PropertyType::Date => "date",
            PropertyType::Time => "time",
            PropertyType::Blob => "blob",
        }
    }

    /// Whether values of this type are always rendered as JSON strings.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            PropertyType::String | PropertyType::Text | PropertyType::Decimal
        )
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        PropertyType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| format!("Unknown property type: {s}"))
    }
}

impl TryFrom<String> for PropertyType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PropertyType> for String {
    fn from(value: PropertyType) -> Self {
        value.as_str().to_string()
    }
}
