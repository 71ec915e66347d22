//! Install, uninstall, and launch orchestration for appkeep.
//!
//! - [`BundleInspector`] reads `Info.toml` and the trust report into an
//!   [`ApplicationRecord`](appkeep_core::ApplicationRecord) candidate.
//! - [`InstallationOrchestrator`] runs the multi-step workflows against the
//!   shared [`ApplicationRegistry`](appkeep_registry::ApplicationRegistry).
//! - [`Workspace`] is the entry point for front ends.
//!
//! The trust subsystem, bundle-container manager, and process launcher are
//! traits ([`TrustSubsystem`], [`ContainerManager`], [`Launcher`]) with
//! filesystem-backed defaults.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod container;
pub mod error;
pub mod facade;
pub mod inspector;
pub mod launcher;
pub mod manifest;
pub mod orchestrator;
pub mod policy;
pub mod trust;

pub use container::{
    ContainerManager, FsContainerManager, MANAGED_MARKER, StagedBundle, is_managed_install,
};
pub use error::{
    ContainerError, ContainerResult, InspectError, InspectResult, LaunchError, LaunchResult,
    OrchestratorError, OrchestratorResult, SigningError, SigningResult,
};
pub use facade::{Workspace, WorkspaceError, WorkspaceErrorKind, WorkspaceResult};
pub use inspector::BundleInspector;
pub use launcher::{LaunchRequest, Launcher, ProcessLauncher};
pub use manifest::{BundleManifest, MANIFEST_FILE_NAME};
pub use orchestrator::{
    CleanupFailure, IncompleteCleanup, InstallOptions, InstallOutcome, InstallPhase,
    InstallationOrchestrator, IntegrityViolation, IntegrityViolationKind, UninstallOptions,
    UninstallOutcome,
};
pub use policy::ProtectionPolicy;
pub use trust::{EmbeddedSignatureVerifier, SigningReport, TrustSubsystem};
