//! Schema model and related types
//!
//! Record types and the file-reference attributes they carry. These are the
//! declarative replacement for runtime model introspection: every record type
//! is registered up front together with the columns that hold upload paths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default primary key column for record types that don't name one
pub const DEFAULT_ID_COLUMN: &str = "id";

/// A category of records, backed by one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecordType {
    /// Stable label used in reports and field identifiers (e.g. `documents.Document`)
    pub label: String,
    /// Backing table name
    pub table: String,
    /// Primary key column
    #[serde(default = "default_id_column")]
    pub id_column: String,
}

fn default_id_column() -> String {
    DEFAULT_ID_COLUMN.to_string()
}

impl RecordType {
    pub fn new(label: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            table: table.into(),
            id_column: default_id_column(),
        }
    }

    #[must_use]
    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = id_column.into();
        self
    }
}

/// A record attribute holding a path into storage, or empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileAttribute {
    /// Attribute name as exposed to operators
    pub name: String,
    /// Backing column; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Whether the stored value may be cleared without violating a constraint
    #[serde(default)]
    pub allows_empty: bool,
}

impl FileAttribute {
    pub fn new(name: impl Into<String>, allows_empty: bool) -> Self {
        Self {
            name: name.into(),
            column: None,
            allows_empty,
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Column the attribute is stored in
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Identifies one attribute of one record type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeKey {
    pub record_type: String,
    pub attribute: String,
}

impl AttributeKey {
    pub fn new(record_type: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            attribute: attribute.into(),
        }
    }

    /// Case-folded `label.attribute` identifier operators pass on the command line
    pub fn identifier(&self) -> String {
        format!(
            "{}.{}",
            self.record_type.to_lowercase(),
            self.attribute.to_lowercase()
        )
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.record_type, self.attribute)
    }
}

/// Opaque record identifier, unique within its record type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
