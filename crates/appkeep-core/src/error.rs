//! Core error types.

/// Errors from core type construction.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The application identifier is malformed.
    #[error("invalid application identifier: {0}")]
    InvalidId(String),

    /// The application type name is not recognized.
    #[error("unknown application type: {0}")]
    UnknownApplicationType(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
