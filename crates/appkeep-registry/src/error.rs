//! Registry error types.

use std::path::PathBuf;

use appkeep_core::ApplicationId;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No record with this identifier exists.
    #[error("application not found: {0}")]
    NotFound(ApplicationId),

    /// An installed record with this identifier already exists.
    #[error("application already installed: {0}")]
    DuplicateIdentifier(ApplicationId),

    /// The on-disk index could not be read, parsed, locked, or written.
    #[error("index error at {path}: {message}")]
    IndexError {
        /// Path to the index file.
        path: PathBuf,
        /// Error description.
        message: String,
    },

    /// A thread panicked while holding the registry lock.
    #[error("registry lock poisoned: {0}")]
    Poisoned(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
