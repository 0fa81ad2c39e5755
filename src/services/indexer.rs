//! Reference Indexer
//!
//! Maps every non-empty stored path to the record that references it. One
//! bulk read is issued per record type. When several records reference the
//! same path the last one read owns it in the index; the collision itself is
//! kept so it can be reported.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{KnownReference, SharedPath};
use crate::services::field_registry::ResolvedSchema;
use crate::services::record_repository::{RecordRepository, RepositoryError};

/// Known paths and their owning records
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: HashMap<String, KnownReference>,
    shared: BTreeMap<String, Vec<KnownReference>>,
}

impl ReferenceIndex {
    /// Record a reference, replacing any previous owner of the same path
    pub fn insert(&mut self, path: String, reference: KnownReference) {
        if let Some(previous) = self.entries.insert(path.clone(), reference.clone()) {
            if previous != reference {
                self.shared
                    .entry(path)
                    .or_insert_with(|| vec![previous])
                    .push(reference);
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&KnownReference> {
        self.entries.get(path)
    }

    pub fn known_paths(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Paths claimed by more than one record, every claimant in read order
    pub fn shared_paths(&self) -> Vec<SharedPath> {
        self.shared
            .iter()
            .map(|(path, owners)| SharedPath {
                path: path.clone(),
                owners: owners.clone(),
            })
            .collect()
    }
}

pub struct ReferenceIndexer {
    records: Arc<dyn RecordRepository>,
}

impl ReferenceIndexer {
    pub fn new(records: Arc<dyn RecordRepository>) -> Self {
        Self { records }
    }

    /// Read every record of every record type and index its file references
    pub async fn build(&self, schema: &ResolvedSchema) -> Result<ReferenceIndex, RepositoryError> {
        let mut index = ReferenceIndex::default();

        for resolved in schema.record_types() {
            if resolved.fields.is_empty() {
                continue;
            }

            let attributes = resolved.attributes();
            let rows = self
                .records
                .bulk_read(&resolved.record_type, &attributes)
                .await?;

            debug!(
                record_type = %resolved.record_type.label,
                rows = rows.len(),
                "Indexed record type"
            );

            for row in rows {
                for (field, value) in resolved.fields.iter().zip(row.values) {
                    let Some(path) = value.filter(|v| !v.is_empty()) else {
                        continue;
                    };
                    index.insert(
                        path,
                        KnownReference {
                            key: field.key.clone(),
                            id: row.id.clone(),
                        },
                    );
                }
            }
        }

        for shared in index.shared_paths() {
            warn!(
                path = %shared.path,
                owners = shared.owners.len(),
                "Path referenced by several records, only the last one is tracked"
            );
        }

        info!(count = index.entries.len(), "Reference index built");
        Ok(index)
    }
}
