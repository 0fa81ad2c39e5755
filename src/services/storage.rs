//! Storage Backend
//!
//! Hierarchical file storage holding uploaded files. The local implementation
//! walks a directory tree with symlink following; exclusion of directories
//! happens during traversal so excluded trees are never descended into.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory names skipped by default (`__pycache__`, `__sized__`, ...)
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[r"^__.+__$"];

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage root {root} is not readable: {source}")]
    RootUnreadable {
        root: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Path escapes the storage root: {0}")]
    InvalidPath(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Directory name patterns excluded from traversal.
///
/// Patterns are matched against the bare directory name and must match at
/// the start of the name.
#[derive(Debug, Clone, Default)]
pub struct DirExclusions {
    patterns: Vec<Regex>,
}

impl DirExclusions {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// No exclusions at all
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_excluded(&self, dir_name: &str) -> bool {
        self.patterns
            .iter()
            .any(|re| re.find(dir_name).is_some_and(|m| m.start() == 0))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }
}

/// Capability to list and remove files under a storage root
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Storage root all listed paths live under
    fn root(&self) -> &Path;

    /// Recursively list every regular file under the root, following
    /// symlinks and skipping excluded directories. Returned paths are
    /// absolute (prefixed with [`StorageBackend::root`]).
    async fn walk(&self, exclusions: &DirExclusions) -> Result<Vec<PathBuf>, StorageError>;

    /// Remove one file, addressed relative to the root
    async fn remove(&self, relative: &str) -> Result<(), StorageError>;
}

/// Storage rooted in a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn walk(&self, exclusions: &DirExclusions) -> Result<Vec<PathBuf>, StorageError> {
        let root = self.root.clone();
        let exclusions = exclusions.clone();

        tokio::task::spawn_blocking(move || walk_blocking(&root, &exclusions))
            .await
            .map_err(|e| StorageError::Internal(format!("Storage walk panicked: {e}")))?
    }

    async fn remove(&self, relative: &str) -> Result<(), StorageError> {
        let path = resolve_relative(&self.root, relative)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|source| StorageError::Remove {
                path: relative.to_string(),
                source,
            })?;
        debug!(path = %path.display(), "Removed file");
        Ok(())
    }
}

fn walk_blocking(root: &Path, exclusions: &DirExclusions) -> Result<Vec<PathBuf>, StorageError> {
    let unreadable = |source: io::Error| StorageError::RootUnreadable {
        root: root.display().to_string(),
        source,
    };

    let metadata = std::fs::metadata(root).map_err(unreadable)?;
    if !metadata.is_dir() {
        return Err(unreadable(io::Error::other("not a directory")));
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !exclusions.is_excluded(&entry.file_name().to_string_lossy())
        });

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(err) if err.depth() == 0 => return Err(unreadable(err.into())),
            Err(err) => {
                warn!(%err, "Skipping unreadable storage entry");
            }
        }
    }

    Ok(files)
}

/// Join a root-relative path, refusing anything that would leave the root
pub(crate) fn resolve_relative(root: &Path, relative: &str) -> Result<PathBuf, StorageError> {
    let candidate = Path::new(relative);
    let escapes = relative.is_empty()
        || candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(StorageError::InvalidPath(relative.to_string()));
    }
    Ok(root.join(candidate))
}
