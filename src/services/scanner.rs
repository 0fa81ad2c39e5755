//! Storage Scanner
//!
//! Builds the set of files that actually exist in storage, as root-relative
//! forward-slash paths comparable to the values stored on records.

use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::services::storage::{DirExclusions, StorageBackend, StorageError};

pub struct StorageScanner {
    storage: Arc<dyn StorageBackend>,
    exclusions: DirExclusions,
}

impl StorageScanner {
    pub fn new(storage: Arc<dyn StorageBackend>, exclusions: DirExclusions) -> Self {
        Self {
            storage,
            exclusions,
        }
    }

    /// Relative paths of every file present in storage
    pub async fn scan(&self) -> Result<BTreeSet<String>, StorageError> {
        let root = self.storage.root();
        debug!(
            root = %root.display(),
            exclusions = ?self.exclusions.patterns().collect::<Vec<_>>(),
            "Scanning storage"
        );

        let files = self.storage.walk(&self.exclusions).await?;

        let mut existing = BTreeSet::new();
        for path in files {
            match relative_path(root, &path) {
                Some(relative) => {
                    existing.insert(relative);
                }
                None if !path.starts_with(root) => {
                    warn!(path = %path.display(), "Ignoring file outside storage root")
                }
                None => warn!(
                    path = %path.display(),
                    "Ignoring file whose name is not valid UTF-8, no record can reference it"
                ),
            }
        }

        info!(count = existing.len(), "Storage scan complete");
        Ok(existing)
    }
}

/// Root-relative path with `/` separators and no leading slash.
///
/// `None` for paths outside the root or with non UTF-8 components.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let stripped = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
