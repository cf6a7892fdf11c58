//! Error types for the core model.

use std::path::PathBuf;

use thiserror::Error;

use crate::operation::OperationKind;

/// Errors raised by core types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Paired operation with unequal source/destination counts.
    #[error("{kind} request has {sources} sources but {destinations} destinations")]
    MismatchedPairs {
        kind: OperationKind,
        sources: usize,
        destinations: usize,
    },

    /// Structurally invalid request.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Failed to read the configuration file.
    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("Invalid config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Invalid configuration values.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}
