//! Report model and related types
//!
//! Structured output of a prune run. Rendering to text or JSON happens in
//! `crate::output`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::schema::{AttributeKey, RecordId};

/// The record that claims a stored path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownReference {
    #[serde(flatten)]
    pub key: AttributeKey,
    pub id: RecordId,
}

/// A mutation applied during the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Action {
    /// Attribute cleared on a record referencing a missing file
    #[serde(rename_all = "camelCase")]
    Blanked {
        record_type: String,
        attribute: String,
        id: RecordId,
        path: String,
    },
    /// Record deleted because it referenced a missing file
    #[serde(rename_all = "camelCase")]
    DeletedRecord {
        record_type: String,
        attribute: String,
        id: RecordId,
        path: String,
    },
    /// Orphaned file removed from storage
    DeletedFile { path: String },
}

impl Action {
    pub fn blanked(reference: &KnownReference, path: &str) -> Self {
        Self::Blanked {
            record_type: reference.key.record_type.clone(),
            attribute: reference.key.attribute.clone(),
            id: reference.id.clone(),
            path: path.to_string(),
        }
    }

    pub fn deleted_record(reference: &KnownReference, path: &str) -> Self {
        Self::DeletedRecord {
            record_type: reference.key.record_type.clone(),
            attribute: reference.key.attribute.clone(),
            id: reference.id.clone(),
            path: path.to_string(),
        }
    }

    /// Whether this action touched the record store
    pub fn is_record_mutation(&self) -> bool {
        !matches!(self, Self::DeletedFile { .. })
    }
}

/// File attributes discovered for one record type
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTypeFields {
    pub record_type: String,
    pub attributes: Vec<String>,
}

/// Unresolved missing paths for one attribute
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingGroup {
    #[serde(flatten)]
    pub key: AttributeKey,
    pub count: usize,
    /// Sorted
    pub paths: Vec<String>,
}

/// A path claimed by more than one record; only the last one read is acted on
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPath {
    pub path: String,
    pub owners: Vec<KnownReference>,
}

/// Result of a prune run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub file_fields: Vec<RecordTypeFields>,
    /// Attributes requested for blanking that may not be empty
    pub downgraded: Vec<AttributeKey>,
    pub known_count: usize,
    pub existing_count: usize,
    pub shared_paths: Vec<SharedPath>,
    /// Size of `known - existing` before remediation
    pub missing_count: usize,
    pub missing: Vec<MissingGroup>,
    pub orphan_count: usize,
    /// Sorted
    pub orphans: Vec<String>,
    pub orphans_deleted: bool,
    /// In the order they were applied
    pub actions: Vec<Action>,
}

impl PruneReport {
    pub fn unresolved_missing(&self) -> usize {
        self.missing.iter().map(|group| group.count).sum()
    }

    pub fn record_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| a.is_record_mutation())
    }

    pub fn file_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| !a.is_record_mutation())
    }
}
