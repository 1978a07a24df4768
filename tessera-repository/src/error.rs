//! Error types for the repository layer.

use tessera_common::ConfigError;
use thiserror::Error;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur in repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Invalid or incomplete connection settings.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// An entity with the same key is already stored.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// No entity is stored under the key.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// The entity type cannot back a repository.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Database error from DuckDB.
    #[error("database error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
