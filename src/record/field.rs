//! Field definitions used for schema synthesis and boundary coercion.
//!
//! A [`FieldDefinition`] is supplied once, at schema-creation time, and is
//! never mutated after the backing table exists. The repository facade and
//! the bulk import path both consult the same definitions when normalizing
//! incoming records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical column types, mapped to backend-native types per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    /// Bounded UTF-8 string; `length` caps the stored value.
    String,
    /// Unbounded UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Double,
    /// Boolean.
    Boolean,
    /// Point in time, stored in UTC.
    Date,
}

impl LogicalType {
    /// Returns the type name used in configuration and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            LogicalType::String => "string",
            LogicalType::Text => "text",
            LogicalType::Integer => "integer",
            LogicalType::Double => "double",
            LogicalType::Boolean => "boolean",
            LogicalType::Date => "date",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Schema metadata for one column of a repository table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field (column) name.
    pub name: String,
    /// Logical type, resolved to a native column type by the dialect.
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
    /// Maximum length for string fields; ignored for other types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Whether the column accepts NULL.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl FieldDefinition {
    /// Create a definition with the given name and logical type.
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            length: None,
            nullable: true,
        }
    }

    /// Create a bounded string field.
    pub fn string(name: impl Into<String>, length: u32) -> Self {
        Self {
            length: Some(length),
            ..Self::new(name, LogicalType::String)
        }
    }

    /// Create an unbounded text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Text)
    }

    /// Create an integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Integer)
    }

    /// Create a double field.
    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Double)
    }

    /// Create a boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Boolean)
    }

    /// Create a date field.
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Date)
    }

    /// Mark the field NOT NULL.
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}
