//! In-memory collaborators for testing.
//!
//! `InMemoryRecordRepository` and `InMemoryStorage` implement the repository
//! and storage traits without a database or filesystem, record every call,
//! and can be told to fail specific operations.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{FileAttribute, RecordId, RecordType};
use crate::services::record_repository::{RecordRepository, RecordRow, RepositoryError};
use crate::services::storage::{DirExclusions, StorageBackend, StorageError, resolve_relative};

/// Record of a method call.
#[derive(Debug, Clone)]
pub struct MockCall {
    /// Method name (e.g., "bulk_read", "remove")
    pub method: String,
    /// Arguments passed to the method
    pub args: Vec<String>,
}

impl MockCall {
    /// Create a new mock call record.
    pub fn new(method: &str, args: Vec<String>) -> Self {
        Self {
            method: method.to_string(),
            args,
        }
    }
}

/// Records keyed by label, then id, then attribute name
type Tables = BTreeMap<String, BTreeMap<RecordId, BTreeMap<String, String>>>;

#[derive(Default)]
struct RepositoryState {
    tables: Tables,
    calls: Vec<MockCall>,
    failures: HashSet<(String, RecordId)>,
    cascades: Vec<(String, String)>,
}

/// Record repository backed by nested maps.
#[derive(Default)]
pub struct InMemoryRecordRepository {
    state: Mutex<RepositoryState>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record. Attributes not listed read back as `None`.
    pub fn insert(&self, record_type: &str, id: &str, values: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let record = values
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        state
            .tables
            .entry(record_type.to_string())
            .or_default()
            .insert(RecordId::from(id), record);
    }

    /// Make `method` ("update" or "delete") fail for the given record id.
    pub fn fail_on(&self, method: &str, id: &str) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failures
            .insert((method.to_string(), RecordId::from(id)));
    }

    /// Deleting a `from` record also removes the `to` record with the same
    /// id, like a foreign key with `ON DELETE CASCADE`.
    pub fn cascade(&self, from: &str, to: &str) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cascades
            .push((from.to_string(), to.to_string()));
    }

    pub fn exists(&self, record_type: &str, id: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .tables
            .get(record_type)
            .is_some_and(|t| t.contains_key(&RecordId::from(id)))
    }

    pub fn value(&self, record_type: &str, id: &str, attribute: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .tables
            .get(record_type)?
            .get(&RecordId::from(id))?
            .get(attribute)
            .cloned()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Number of update and delete calls
    pub fn mutation_count(&self) -> usize {
        self.call_count("update") + self.call_count("delete")
    }

    fn check_failure(
        state: &RepositoryState,
        method: &str,
        id: &RecordId,
    ) -> Result<(), RepositoryError> {
        if state.failures.contains(&(method.to_string(), id.clone())) {
            return Err(RepositoryError::Rejected(format!(
                "{method} of {id} violates a constraint"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn bulk_read(
        &self,
        record_type: &RecordType,
        attributes: &[FileAttribute],
    ) -> Result<Vec<RecordRow>, RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .calls
            .push(MockCall::new("bulk_read", vec![record_type.label.clone()]));

        let rows = state
            .tables
            .get(&record_type.label)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, record)| RecordRow {
                        id: id.clone(),
                        values: attributes
                            .iter()
                            .map(|attr| record.get(&attr.name).cloned())
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn update(
        &self,
        record_type: &RecordType,
        id: &RecordId,
        attribute: &FileAttribute,
        value: &str,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(MockCall::new(
            "update",
            vec![
                record_type.label.clone(),
                id.to_string(),
                attribute.name.clone(),
                value.to_string(),
            ],
        ));
        Self::check_failure(&state, "update", id)?;

        let Some(record) = state
            .tables
            .get_mut(&record_type.label)
            .and_then(|t| t.get_mut(id))
        else {
            return Ok(false);
        };
        record.insert(attribute.name.clone(), value.to_string());
        Ok(true)
    }

    async fn delete(
        &self,
        record_type: &RecordType,
        id: &RecordId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(MockCall::new(
            "delete",
            vec![record_type.label.clone(), id.to_string()],
        ));
        Self::check_failure(&state, "delete", id)?;

        let removed = state
            .tables
            .get_mut(&record_type.label)
            .and_then(|t| t.remove(id))
            .is_some();

        if removed {
            let dependents: Vec<String> = state
                .cascades
                .iter()
                .filter(|(from, _)| *from == record_type.label)
                .map(|(_, to)| to.clone())
                .collect();
            for dependent in dependents {
                if let Some(table) = state.tables.get_mut(&dependent) {
                    table.remove(id);
                }
            }
        }
        Ok(removed)
    }
}

#[derive(Default)]
struct StorageState {
    files: BTreeSet<String>,
    calls: Vec<MockCall>,
    failing_removals: HashSet<String>,
    unreadable: bool,
}

/// Storage holding a set of root-relative file paths.
pub struct InMemoryStorage {
    root: PathBuf,
    state: Mutex<StorageState>,
}

impl InMemoryStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(StorageState::default()),
        }
    }

    pub fn add_files<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.files.extend(paths.into_iter().map(Into::into));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).files.contains(path)
    }

    pub fn files(&self) -> Vec<String> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).files.iter().cloned().collect()
    }

    /// Make removal of `path` fail with permission denied
    pub fn fail_remove(&self, path: &str) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failing_removals
            .insert(path.to_string());
    }

    /// Make every walk fail as if the root could not be read
    pub fn set_unreadable(&self, unreadable: bool) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).unreadable = unreadable;
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    fn in_excluded_dir(path: &str, exclusions: &DirExclusions) -> bool {
        let mut dirs: Vec<&str> = path.split('/').collect();
        dirs.pop();
        dirs.into_iter().any(|dir| exclusions.is_excluded(dir))
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn walk(&self, exclusions: &DirExclusions) -> Result<Vec<PathBuf>, StorageError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(MockCall::new(
            "walk",
            vec![self.root.display().to_string()],
        ));

        if state.unreadable {
            return Err(StorageError::RootUnreadable {
                root: self.root.display().to_string(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }

        Ok(state
            .files
            .iter()
            .filter(|path| !Self::in_excluded_dir(path, exclusions))
            .map(|path| self.root.join(path))
            .collect())
    }

    async fn remove(&self, relative: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .calls
            .push(MockCall::new("remove", vec![relative.to_string()]));
        resolve_relative(&self.root, relative)?;

        let failure = if state.failing_removals.contains(relative) {
            Some(io::ErrorKind::PermissionDenied)
        } else if !state.files.remove(relative) {
            Some(io::ErrorKind::NotFound)
        } else {
            None
        };

        match failure {
            Some(kind) => Err(StorageError::Remove {
                path: relative.to_string(),
                source: io::Error::from(kind),
            }),
            None => Ok(()),
        }
    }
}
