//! Prune Service
//!
//! Runs one full audit: resolve field policies, index references, scan
//! storage, remediate missing files, and optionally delete orphans. Each phase
//! completes before the next starts; nothing is mutated until both the index
//! and the scan are complete.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::PruneError;
use crate::models::PruneReport;
use crate::services::field_registry;
use crate::services::indexer::ReferenceIndexer;
use crate::services::orphan_remover::OrphanRemover;
use crate::services::reconciler::{Reconciler, diff};
use crate::services::record_repository::RecordRepository;
use crate::services::scanner::StorageScanner;
use crate::services::schema::SchemaSource;
use crate::services::storage::{DirExclusions, StorageBackend};

/// Options for a single run
#[derive(Debug, Clone, Default)]
pub struct PruneOptions {
    /// `label.attribute` identifiers to blank when their file is missing
    pub blank_missing: Vec<String>,
    /// `label.attribute` identifiers whose records are deleted when their file is missing
    pub delete_invalid: Vec<String>,
    /// Remove unreferenced files from storage
    pub delete_orphans: bool,
    pub exclusions: DirExclusions,
}

pub struct PruneService {
    schema: Arc<dyn SchemaSource>,
    records: Arc<dyn RecordRepository>,
    storage: Arc<dyn StorageBackend>,
}

impl PruneService {
    pub fn new(
        schema: Arc<dyn SchemaSource>,
        records: Arc<dyn RecordRepository>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            schema,
            records,
            storage,
        }
    }

    pub async fn run(&self, options: &PruneOptions) -> Result<PruneReport, PruneError> {
        let started_at = Utc::now();

        let schema = field_registry::resolve(
            self.schema.as_ref(),
            &options.blank_missing,
            &options.delete_invalid,
        )?;
        info!(
            record_types = schema.record_types().len(),
            fields = schema.fields().count(),
            "Resolved file fields"
        );

        let index = ReferenceIndexer::new(Arc::clone(&self.records))
            .build(&schema)
            .await?;
        let known = index.known_paths();

        let existing = StorageScanner::new(Arc::clone(&self.storage), options.exclusions.clone())
            .scan()
            .await?;

        let delta = diff(&known, &existing);
        info!(
            missing = delta.missing.len(),
            orphaned = delta.orphaned.len(),
            "Computed differences"
        );

        let remediation = Reconciler::new(Arc::clone(&self.records))
            .remediate(&schema, &index, &delta.missing)
            .await?;
        let mut actions = remediation.actions;

        if options.delete_orphans {
            let removed = OrphanRemover::new(Arc::clone(&self.storage))
                .remove_all(&delta.orphaned)
                .await?;
            actions.extend(removed);
        }

        let report = PruneReport {
            started_at,
            completed_at: Utc::now(),
            file_fields: schema.file_fields(),
            downgraded: schema.downgraded(),
            known_count: known.len(),
            existing_count: existing.len(),
            shared_paths: index.shared_paths(),
            missing_count: delta.missing.len(),
            missing: remediation.unresolved,
            orphan_count: delta.orphaned.len(),
            orphans: delta.orphaned,
            orphans_deleted: options.delete_orphans,
            actions,
        };

        info!(
            actions = report.actions.len(),
            unresolved = report.unresolved_missing(),
            "Prune run complete"
        );
        Ok(report)
    }
}
