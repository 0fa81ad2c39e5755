//! prune-uploads - keep uploaded files and database references in sync
//!
//! Audits a record store holding file references against the upload
//! directory, reporting references to missing files and files no record
//! references, and optionally repairing both.

pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod services;
pub mod testing;

pub use config::{Config, ConfigError};
pub use error::PruneError;

pub use models::{
    Action, AttributeKey, FileAttribute, KnownReference, MissingGroup, PruneReport, RecordId,
    RecordType, RecordTypeFields, RemediationPolicy, SharedPath,
};

pub use services::{
    DirExclusions, LocalStorage, PgRecordRepository, PruneOptions, PruneService, RecordRepository,
    SchemaRegistry, SchemaSource, StorageBackend,
};
