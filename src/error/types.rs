//! Error types
//!
//! Domain-specific error types for the storage core and server startup.

use std::io;
use thiserror::Error;

/// Storage module errors
///
/// These are the only failure conditions a storage backend reports. The
/// service layer passes them through untouched; the protocol layer maps
/// them onto reply codes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The caller supplied an unusable file name.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A stored file with the same name is already present.
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    /// No stored file has the requested name.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Unexpected filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that stop the server from starting or running
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Network error: {0}")]
    Io(#[from] io::Error),
}
