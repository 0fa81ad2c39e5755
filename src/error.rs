use thiserror::Error;

use crate::config::ConfigError;
use crate::services::field_registry::FieldRegistryError;
use crate::services::reconciler::ReconcileError;
use crate::services::record_repository::RepositoryError;
use crate::services::schema::SchemaError;
use crate::services::storage::StorageError;

/// Errors that abort a prune run
#[derive(Debug, Error)]
pub enum PruneError {
    /// Bad environment or command line values
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Declarative schema could not be loaded
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Unknown `label.attribute` identifiers; raised before any read or scan
    #[error(transparent)]
    Configuration(#[from] FieldRegistryError),

    /// Storage root unreadable, or an orphan could not be removed
    #[error(transparent)]
    StorageAccess(#[from] StorageError),

    /// Record read failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Record update or delete failed during remediation
    #[error(transparent)]
    Remediation(#[from] ReconcileError),

    /// Report could not be serialized
    #[error("Failed to render report: {0}")]
    Output(#[from] serde_json::Error),
}

impl PruneError {
    /// Stable code for logs and JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::StorageAccess(_) => "STORAGE_ACCESS_ERROR",
            Self::Repository(_) | Self::Remediation(_) => "REPOSITORY_ERROR",
            Self::Output(_) => "OUTPUT_ERROR",
        }
    }

    /// Process exit status for the binary
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Schema(_) | Self::Configuration(_) => 2,
            Self::StorageAccess(_) => 3,
            Self::Repository(_) | Self::Remediation(_) => 4,
            Self::Output(_) => 1,
        }
    }
}
