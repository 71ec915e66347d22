//! Error types for inspection, staging, launching, and orchestration.

use std::path::PathBuf;

use appkeep_core::ApplicationId;
use appkeep_registry::RegistryError;

/// Errors reported by a trust subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The trust subsystem cannot report a signer for this bundle.
    #[error("no signature available for {path}")]
    Unavailable {
        /// Bundle path.
        path: PathBuf,
    },

    /// The signature exists but does not validate.
    #[error("signature rejected for {path}: {reason}")]
    Rejected {
        /// Bundle path.
        path: PathBuf,
        /// Why validation failed.
        reason: String,
    },
}

/// Result type for trust operations.
pub type SigningResult<T> = Result<T, SigningError>;

/// Errors from reading a bundle.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// The manifest is missing, unreadable, or does not parse.
    #[error("malformed bundle at {path}: {reason}")]
    MalformedBundle {
        /// Bundle path.
        path: PathBuf,
        /// What is wrong.
        reason: String,
    },

    /// The manifest names an executable that is not in the bundle.
    #[error("bundle at {path} declares executable '{executable}', which does not exist")]
    MissingExecutable {
        /// Bundle path.
        path: PathBuf,
        /// Declared executable name.
        executable: String,
    },

    /// The trust subsystem failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Result type for inspection.
pub type InspectResult<T> = Result<T, InspectError>;

/// Errors from the bundle-container manager.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// A filesystem operation failed.
    #[error("{operation} failed at {path}: {source}")]
    Io {
        /// What was being done.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The bundle source contains a symbolic link.
    #[error("bundle contains a symlink at {path}, which is not allowed")]
    SymlinkRejected {
        /// Path of the link.
        path: PathBuf,
    },

    /// Staging was refused (e.g. an injected failure).
    #[error("staging refused for {id}: {reason}")]
    Refused {
        /// Application being staged.
        id: ApplicationId,
        /// Why.
        reason: String,
    },
}

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors from the process-launch mechanism.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The record has no executable to launch.
    #[error("application {0} has no executable")]
    NoExecutable(ApplicationId),

    /// The process could not be started.
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        /// Executable path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The launcher refused the request.
    #[error("launch of {id} failed: {reason}")]
    Failed {
        /// Application identifier.
        id: ApplicationId,
        /// Why.
        reason: String,
    },
}

/// Result type for launch operations.
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Errors from orchestrated workflows.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Bundle inspection failed; nothing was written.
    #[error(transparent)]
    Inspect(#[from] InspectError),

    /// Staging failed; partial files were cleaned up.
    #[error(transparent)]
    Staging(#[from] ContainerError),

    /// The registry rejected the operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Policy forbids removing this application.
    #[error("application {id} is protected: {reason}")]
    ProtectedApplication {
        /// Application identifier.
        id: ApplicationId,
        /// Which rule applies.
        reason: String,
    },

    /// The application may not be launched.
    #[error("application {0} is launch-prohibited")]
    LaunchProhibited(ApplicationId),

    /// The launcher failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Result type for orchestrated workflows.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
