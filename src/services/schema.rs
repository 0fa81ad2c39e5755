//! Schema Registry
//!
//! Central registration point for record types and their file-reference
//! attributes. Record types are registered programmatically or loaded from a
//! declarative JSON schema file; the rest of the crate only sees the
//! resulting attribute listing through [`SchemaSource`].

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{FileAttribute, RecordType};

/// SQL identifiers we are willing to interpolate as quoted names
static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Schema registration errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid SQL identifier {identifier:?} in record type {record_type}")]
    InvalidIdentifier {
        record_type: String,
        identifier: String,
    },

    #[error("Record type label must not be empty")]
    EmptyLabel,

    #[error("Record type registered twice (labels are case-insensitive): {0}")]
    DuplicateRecordType(String),

    #[error("Attribute registered twice: {record_type}.{attribute}")]
    DuplicateAttribute {
        record_type: String,
        attribute: String,
    },
}

/// Capability to enumerate every file-reference attribute of every record type
pub trait SchemaSource: Send + Sync {
    /// All `(record type, attribute)` pairs, in registration order
    fn list_file_attributes(&self) -> Vec<(Arc<RecordType>, FileAttribute)>;
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    record_types: Vec<RecordTypeDecl>,
}

#[derive(Debug, Deserialize)]
struct RecordTypeDecl {
    #[serde(flatten)]
    record_type: RecordType,
    #[serde(default)]
    attributes: Vec<FileAttribute>,
}

#[derive(Debug)]
struct Registration {
    record_type: Arc<RecordType>,
    attributes: Vec<FileAttribute>,
}

/// In-process registry of record types with file attributes
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    registrations: Vec<Registration>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record type together with its file attributes
    pub fn register(
        &mut self,
        record_type: RecordType,
        attributes: Vec<FileAttribute>,
    ) -> Result<&mut Self, SchemaError> {
        validate_record_type(&record_type, &attributes)?;

        if self
            .registrations
            .iter()
            .any(|r| r.record_type.label.to_lowercase() == record_type.label.to_lowercase())
        {
            return Err(SchemaError::DuplicateRecordType(record_type.label));
        }

        debug!(
            record_type = %record_type.label,
            attributes = attributes.len(),
            "Registered record type"
        );

        self.registrations.push(Registration {
            record_type: Arc::new(record_type),
            attributes,
        });
        Ok(self)
    }

    /// Build a registry from a JSON schema document
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for decl in file.record_types {
            registry.register(decl.record_type, decl.attributes)?;
        }
        Ok(registry)
    }

    /// Load a registry from a JSON schema file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SchemaError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl SchemaSource for SchemaRegistry {
    fn list_file_attributes(&self) -> Vec<(Arc<RecordType>, FileAttribute)> {
        self.registrations
            .iter()
            .flat_map(|r| {
                r.attributes
                    .iter()
                    .map(|attr| (Arc::clone(&r.record_type), attr.clone()))
            })
            .collect()
    }
}

fn validate_record_type(
    record_type: &RecordType,
    attributes: &[FileAttribute],
) -> Result<(), SchemaError> {
    if record_type.label.trim().is_empty() {
        return Err(SchemaError::EmptyLabel);
    }

    let identifiers = [record_type.table.as_str(), record_type.id_column.as_str()]
        .into_iter()
        .chain(attributes.iter().map(FileAttribute::column_name));
    for identifier in identifiers {
        if !IDENTIFIER_RE.is_match(identifier) {
            return Err(SchemaError::InvalidIdentifier {
                record_type: record_type.label.clone(),
                identifier: identifier.to_string(),
            });
        }
    }

    let mut seen = HashSet::new();
    for attr in attributes {
        if !seen.insert(attr.name.to_lowercase()) {
            return Err(SchemaError::DuplicateAttribute {
                record_type: record_type.label.clone(),
                attribute: attr.name.clone(),
            });
        }
    }

    Ok(())
}
