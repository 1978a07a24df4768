//! Error types for configuration handling.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while validating configuration.
///
/// These are always fatal for the component being constructed and are never
/// retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required property is absent or empty.
    #[error("missing property: {0}")]
    MissingProperty(String),

    /// A property is present but its value cannot be used.
    #[error("invalid value for {key}: {reason}")]
    InvalidProperty { key: String, reason: String },

    /// The driver identifier is not known to the driver registry.
    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    /// The driver refused the connection URL.
    #[error("driver {driver} rejected url {url}: {reason}")]
    InvalidUrl {
        driver: String,
        url: String,
        reason: String,
    },

    /// Neither an inline credential nor a credential file was supplied.
    #[error("missing credential: set {inline} or {file}")]
    MissingCredential { inline: String, file: String },

    /// The credential file could not be read.
    #[error("cannot read credential file {path}: {source}")]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote side refused the supplied settings (bad credentials, unknown host).
    #[error("connection rejected: {0}")]
    Rejected(String),
}
