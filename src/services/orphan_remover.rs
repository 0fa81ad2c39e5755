//! Orphan Remover
//!
//! Deletes files that exist in storage but are referenced by no record.

use std::sync::Arc;

use tracing::info;

use crate::models::Action;
use crate::services::storage::{StorageBackend, StorageError};

pub struct OrphanRemover {
    storage: Arc<dyn StorageBackend>,
}

impl OrphanRemover {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Remove orphans in the given (sorted) order, stopping at the first
    /// failure. Files removed before the failure stay removed.
    pub async fn remove_all(&self, orphaned: &[String]) -> Result<Vec<Action>, StorageError> {
        let mut actions = Vec::with_capacity(orphaned.len());
        for path in orphaned {
            info!("Deleting {}", path);
            self.storage.remove(path).await?;
            actions.push(Action::DeletedFile { path: path.clone() });
        }
        Ok(actions)
    }
}
