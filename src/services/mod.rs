pub mod field_registry;
pub mod indexer;
pub mod orphan_remover;
pub mod prune;
pub mod reconciler;
pub mod record_repository;
pub mod scanner;
pub mod schema;
pub mod storage;

pub use field_registry::{
    FieldRegistryError, ResolvedField, ResolvedRecordType, ResolvedSchema, resolve,
};
pub use indexer::{ReferenceIndex, ReferenceIndexer};
pub use orphan_remover::OrphanRemover;
pub use prune::{PruneOptions, PruneService};
pub use reconciler::{Diff, ReconcileError, Reconciler, Remediation, diff};
pub use record_repository::{PgRecordRepository, RecordRepository, RecordRow, RepositoryError};
pub use scanner::{StorageScanner, relative_path};
pub use schema::{SchemaError, SchemaRegistry, SchemaSource};
pub use storage::{DEFAULT_EXCLUDE_DIRS, DirExclusions, LocalStorage, StorageBackend, StorageError};
