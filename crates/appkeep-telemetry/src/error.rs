//! Telemetry error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A level or directive string did not parse.
    #[error("invalid log directive '{directive}': {reason}")]
    InvalidDirective {
        /// The offending text.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// Unrecognized format name.
    #[error("unknown log format '{0}'")]
    UnknownFormat(String),

    /// The log directory could not be created.
    #[error("cannot create log directory {}: {source}", path.display())]
    LogDirectory {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
