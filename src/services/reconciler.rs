//! Reconciler
//!
//! Diffs known references against files present in storage and applies the
//! per-attribute remediation policy to every missing path. Missing paths are
//! processed in sorted order, one mutation at a time; the first failure aborts
//! the run and earlier mutations stay applied.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Action, AttributeKey, MissingGroup, RecordId, RemediationPolicy};
use crate::services::field_registry::ResolvedSchema;
use crate::services::indexer::ReferenceIndex;
use crate::services::record_repository::{RecordRepository, RepositoryError};

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to empty {key} of {id} ({path}): {source}")]
    Blank {
        key: AttributeKey,
        id: RecordId,
        path: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to delete record {id} because of invalid {key} ({path}): {source}")]
    Delete {
        key: AttributeKey,
        id: RecordId,
        path: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Indexed attribute missing from schema: {0}")]
    UnknownAttribute(AttributeKey),

    #[error("Missing path has no owning record in the index: {0}")]
    Unindexed(String),
}

/// Paths on one side only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Referenced but absent from storage, sorted
    pub missing: Vec<String>,
    /// Present in storage but unreferenced, sorted
    pub orphaned: Vec<String>,
}

/// `known - existing` and `existing - known`
pub fn diff(known: &BTreeSet<String>, existing: &BTreeSet<String>) -> Diff {
    Diff {
        missing: known.difference(existing).cloned().collect(),
        orphaned: existing.difference(known).cloned().collect(),
    }
}

/// Outcome of remediating missing paths
#[derive(Debug, Clone, Default)]
pub struct Remediation {
    /// Blank and delete actions, in the order they were applied
    pub actions: Vec<Action>,
    /// Missing paths left alone, grouped by attribute
    pub unresolved: Vec<MissingGroup>,
}

pub struct Reconciler {
    records: Arc<dyn RecordRepository>,
}

impl Reconciler {
    pub fn new(records: Arc<dyn RecordRepository>) -> Self {
        Self { records }
    }

    /// Apply remediation policies to missing paths.
    ///
    /// `missing` must be sorted; a path absent from `index` is an error.
    /// Records that vanished before their mutation (cascades, concurrent
    /// deletes) are logged and produce no action.
    pub async fn remediate(
        &self,
        schema: &ResolvedSchema,
        index: &ReferenceIndex,
        missing: &[String],
    ) -> Result<Remediation, ReconcileError> {
        let mut actions = Vec::new();
        let mut unresolved: BTreeMap<AttributeKey, Vec<String>> = BTreeMap::new();
        let mut deleted: HashSet<(&str, &RecordId)> = HashSet::new();

        for path in missing {
            let reference = index
                .get(path)
                .ok_or_else(|| ReconcileError::Unindexed(path.clone()))?;
            if deleted.contains(&(reference.key.record_type.as_str(), &reference.id)) {
                debug!(
                    field = %reference.key,
                    id = %reference.id,
                    path = %path,
                    "Owning record already deleted"
                );
                continue;
            }
            let (record_type, field) = schema
                .field(&reference.key)
                .ok_or_else(|| ReconcileError::UnknownAttribute(reference.key.clone()))?;

            match field.effective_policy() {
                RemediationPolicy::BlankIfMissing => {
                    info!(
                        "Emptying {} of {} ({})",
                        reference.key, reference.id, path
                    );
                    let updated = self
                        .records
                        .update(record_type, &reference.id, &field.attribute, "")
                        .await
                        .map_err(|source| ReconcileError::Blank {
                            key: reference.key.clone(),
                            id: reference.id.clone(),
                            path: path.clone(),
                            source,
                        })?;
                    if updated {
                        actions.push(Action::blanked(reference, path));
                    } else {
                        warn!(
                            field = %reference.key,
                            id = %reference.id,
                            "Record already gone, nothing to empty"
                        );
                    }
                }
                RemediationPolicy::DeleteRecordIfMissing => {
                    info!(
                        "Deleting {} of {} because of invalid {} ({})",
                        record_type.label, reference.id, reference.key.attribute, path
                    );
                    let removed = self
                        .records
                        .delete(record_type, &reference.id)
                        .await
                        .map_err(|source| ReconcileError::Delete {
                            key: reference.key.clone(),
                            id: reference.id.clone(),
                            path: path.clone(),
                            source,
                        })?;
                    deleted.insert((reference.key.record_type.as_str(), &reference.id));
                    if removed {
                        actions.push(Action::deleted_record(reference, path));
                    } else {
                        warn!(
                            field = %reference.key,
                            id = %reference.id,
                            "Record already gone, nothing to delete"
                        );
                    }
                }
                RemediationPolicy::ReportOnly => {
                    debug!(field = %reference.key, path = %path, "Missing file left unresolved");
                    unresolved
                        .entry(reference.key.clone())
                        .or_default()
                        .push(path.clone());
                }
            }
        }

        let unresolved = unresolved
            .into_iter()
            .map(|(key, mut paths)| {
                paths.sort();
                MissingGroup {
                    key,
                    count: paths.len(),
                    paths,
                }
            })
            .collect();

        Ok(Remediation {
            actions,
            unresolved,
        })
    }
}
