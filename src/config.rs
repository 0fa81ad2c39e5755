use std::env;
use std::path::PathBuf;

use crate::services::storage::DEFAULT_EXCLUDE_DIRS;

/// Run configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,
    /// Maximum database connections in pool
    pub database_max_connections: u32,
    /// Storage root holding uploaded files
    pub media_root: Option<PathBuf>,
    /// Declarative schema file
    pub schema_path: Option<PathBuf>,
    /// Directory name patterns never descended into
    pub exclude_dirs: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let media_root = env::var("MEDIA_ROOT").ok().map(PathBuf::from);
        let schema_path = env::var("PRUNE_SCHEMA").ok().map(PathBuf::from);

        let exclude_dirs = match env::var("PRUNE_EXCLUDE_DIRS") {
            Ok(value) => value
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => DEFAULT_EXCLUDE_DIRS.iter().map(|p| p.to_string()).collect(),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            media_root,
            schema_path,
            exclude_dirs,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
    #[error("Invalid directory exclusion pattern: {0}")]
    InvalidPattern(String),
}
