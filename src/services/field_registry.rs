//! Field Registry
//!
//! Resolves operator-supplied `label.attribute` identifiers against the file
//! attributes known to the schema and fixes one remediation policy per
//! attribute for the run.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::models::{AttributeKey, FileAttribute, RecordType, RecordTypeFields, RemediationPolicy};
use crate::services::schema::SchemaSource;

/// Field resolution errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldRegistryError {
    /// One or more identifiers matched no file attribute. Both lists are
    /// reported together.
    #[error("Unknown fields: {}", describe_unknown(.blank_missing, .delete_invalid))]
    UnknownFields {
        blank_missing: Vec<String>,
        delete_invalid: Vec<String>,
    },
}

fn describe_unknown(blank_missing: &[String], delete_invalid: &[String]) -> String {
    let mut parts = Vec::new();
    if !blank_missing.is_empty() {
        parts.push(format!("blank-missing: {}", blank_missing.join(", ")));
    }
    if !delete_invalid.is_empty() {
        parts.push(format!("delete-invalid: {}", delete_invalid.join(", ")));
    }
    parts.join("; ")
}

/// A file attribute with its policy for this run
#[derive(Debug, Clone)]
pub struct ResolvedField {
    pub key: AttributeKey,
    pub attribute: FileAttribute,
    /// Policy the operator asked for
    pub policy: RemediationPolicy,
}

impl ResolvedField {
    /// Policy applied during reconciliation
    pub fn effective_policy(&self) -> RemediationPolicy {
        self.policy.effective(self.attribute.allows_empty)
    }

    /// Asked to be blanked but the attribute may not be empty
    pub fn is_downgraded(&self) -> bool {
        self.policy != self.effective_policy()
    }
}

/// One record type with all of its resolved file attributes
#[derive(Debug, Clone)]
pub struct ResolvedRecordType {
    pub record_type: Arc<RecordType>,
    pub fields: Vec<ResolvedField>,
}

impl ResolvedRecordType {
    pub fn attributes(&self) -> Vec<FileAttribute> {
        self.fields.iter().map(|f| f.attribute.clone()).collect()
    }
}

/// Validated view of the schema with policies attached
#[derive(Debug, Clone, Default)]
pub struct ResolvedSchema {
    record_types: Vec<ResolvedRecordType>,
    by_key: HashMap<AttributeKey, (usize, usize)>,
}

impl ResolvedSchema {
    pub fn record_types(&self) -> &[ResolvedRecordType] {
        &self.record_types
    }

    pub fn field(&self, key: &AttributeKey) -> Option<(&Arc<RecordType>, &ResolvedField)> {
        let (rt_idx, field_idx) = *self.by_key.get(key)?;
        let rt = &self.record_types[rt_idx];
        Some((&rt.record_type, &rt.fields[field_idx]))
    }

    pub fn fields(&self) -> impl Iterator<Item = &ResolvedField> {
        self.record_types.iter().flat_map(|rt| rt.fields.iter())
    }

    pub fn downgraded(&self) -> Vec<AttributeKey> {
        self.fields()
            .filter(|f| f.is_downgraded())
            .map(|f| f.key.clone())
            .collect()
    }

    /// Attribute names per record type, sorted by label
    pub fn file_fields(&self) -> Vec<RecordTypeFields> {
        let mut fields: Vec<_> = self
            .record_types
            .iter()
            .map(|rt| RecordTypeFields {
                record_type: rt.record_type.label.clone(),
                attributes: rt.fields.iter().map(|f| f.attribute.name.clone()).collect(),
            })
            .collect();
        fields.sort_by(|a, b| a.record_type.cmp(&b.record_type));
        fields
    }
}

/// Resolve policy identifiers against the schema.
///
/// Fails without side effects if any identifier in either list is unknown.
/// `delete_invalid` wins over `blank_missing` for the same attribute.
pub fn resolve(
    schema: &dyn SchemaSource,
    blank_missing: &[String],
    delete_invalid: &[String],
) -> Result<ResolvedSchema, FieldRegistryError> {
    let mut blank_names: BTreeSet<String> = blank_missing.iter().map(|f| f.to_lowercase()).collect();
    let mut delete_names: BTreeSet<String> =
        delete_invalid.iter().map(|f| f.to_lowercase()).collect();

    let mut resolved = ResolvedSchema::default();

    for (record_type, attribute) in schema.list_file_attributes() {
        let key = AttributeKey::new(record_type.label.clone(), attribute.name.clone());
        let identifier = key.identifier();

        // Both removals must run so each list is checked independently
        let delete = delete_names.remove(&identifier);
        let blank = blank_names.remove(&identifier);
        let policy = if delete {
            RemediationPolicy::DeleteRecordIfMissing
        } else if blank {
            RemediationPolicy::BlankIfMissing
        } else {
            RemediationPolicy::ReportOnly
        };

        let rt_idx = match resolved
            .record_types
            .iter()
            .position(|rt| rt.record_type.label == record_type.label)
        {
            Some(idx) => idx,
            None => {
                resolved.record_types.push(ResolvedRecordType {
                    record_type: Arc::clone(&record_type),
                    fields: Vec::new(),
                });
                resolved.record_types.len() - 1
            }
        };

        let field = ResolvedField {
            key: key.clone(),
            attribute,
            policy,
        };
        if field.is_downgraded() {
            warn!(
                field = %key,
                "Attribute cannot be empty, missing files will only be reported"
            );
        }

        let fields = &mut resolved.record_types[rt_idx].fields;
        resolved.by_key.insert(key, (rt_idx, fields.len()));
        fields.push(field);
    }

    if !blank_names.is_empty() || !delete_names.is_empty() {
        return Err(FieldRegistryError::UnknownFields {
            blank_missing: blank_names.into_iter().collect(),
            delete_invalid: delete_names.into_iter().collect(),
        });
    }

    Ok(resolved)
}
