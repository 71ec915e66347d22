//! Install, uninstall, and launch workflows.
//!
//! Every mutating workflow holds the registry's write guard from its first
//! step to its terminal state, so installs and uninstalls are serialized
//! against each other and no reader observes a half-finished operation.
//!
//! Install runs `Idle → Inspecting → Staging → Registering → Committed`.
//! Inspection failures end in `Failed` with nothing written. Staging and
//! registration failures go through `RollingBack` back to `Idle` after the
//! staged files are discarded. The registry insert is the commit point; an
//! old bundle replaced by an update is deleted only after it.
//!
//! Uninstall removes the registry entry first and then deletes files. File
//! deletion failures after that point are reported as [`IncompleteCleanup`]
//! on an otherwise successful outcome.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

use appkeep_core::{ApplicationId, ApplicationRecord};
use appkeep_registry::{ApplicationRegistry, RegistryError};

use crate::container::{ContainerManager, StagedBundle};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::inspector::BundleInspector;
use crate::launcher::{LaunchRequest, Launcher};
use crate::policy::ProtectionPolicy;

/// Install workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallPhase {
    /// Not started, or returned to rest after a rollback.
    Idle,
    /// Reading the bundle.
    Inspecting,
    /// Copying the bundle to its final location.
    Staging,
    /// Publishing the record.
    Registering,
    /// The record is durable and visible.
    Committed,
    /// Discarding staged files after a failure.
    RollingBack,
    /// Aborted before any side effect.
    Failed,
}

impl InstallPhase {
    /// Lower-case name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Inspecting => "inspecting",
            Self::Staging => "staging",
            Self::Registering => "registering",
            Self::Committed => "committed",
            Self::RollingBack => "rolling_back",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records and logs the phases one install passes through.
struct PhaseLog {
    phases: Vec<InstallPhase>,
}

impl PhaseLog {
    fn new() -> Self {
        Self {
            phases: vec![InstallPhase::Idle],
        }
    }

    fn advance(&mut self, next: InstallPhase) {
        let from = self.current();
        debug!(from = %from, to = %next, "Install phase transition");
        self.phases.push(next);
    }

    fn current(&self) -> InstallPhase {
        self.phases.last().copied().unwrap_or(InstallPhase::Idle)
    }
}

/// Options for [`InstallationOrchestrator::install`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Replace an installed application with the same identifier instead of
    /// failing with `DuplicateIdentifier`.
    pub overwrite_existing: bool,
    /// Register without requiring the executable to be present.
    pub placeholder: bool,
}

/// Options for [`InstallationOrchestrator::uninstall`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UninstallOptions {
    /// Keep the data container on disk.
    pub preserve_container: bool,
}

/// One path that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// The path left behind.
    pub path: PathBuf,
    /// Why deletion failed.
    pub error: String,
}

/// Files left on disk after a committed operation.
///
/// Not an error: the registry already reflects the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteCleanup {
    /// Application the files belonged to.
    pub application_identifier: ApplicationId,
    /// Each path that could not be removed.
    pub failures: Vec<CleanupFailure>,
}

impl IncompleteCleanup {
    fn from_failures(id: &ApplicationId, failures: Vec<CleanupFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self {
                application_identifier: id.clone(),
                failures,
            })
        }
    }
}

impl fmt::Display for IncompleteCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "incomplete cleanup for {}: {} path(s) left behind",
            self.application_identifier,
            self.failures.len()
        )
    }
}

/// Result of a committed install.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// The published record.
    pub record: ApplicationRecord,
    /// The record this install replaced, if any.
    pub replaced: Option<ApplicationRecord>,
    /// Phases passed through, starting at `Idle`.
    pub phases: Vec<InstallPhase>,
    /// Old files that could not be removed after commit.
    pub incomplete_cleanup: Option<IncompleteCleanup>,
}

/// Result of a committed uninstall.
#[derive(Debug, Clone)]
pub struct UninstallOutcome {
    /// The record that was removed.
    pub record: ApplicationRecord,
    /// Files that could not be removed after the registry entry was.
    pub incomplete_cleanup: Option<IncompleteCleanup>,
}

/// What is wrong with an installed application on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityViolationKind {
    /// The bundle directory is gone.
    MissingBundle,
    /// The declared executable is gone.
    MissingExecutable,
    /// The data container is gone.
    MissingContainer,
}

/// An installed record whose files do not match the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    /// Affected application.
    pub application_identifier: ApplicationId,
    /// What is missing.
    pub kind: IntegrityViolationKind,
    /// The missing path.
    pub path: PathBuf,
}

/// Drives install, uninstall, and launch against a shared registry.
pub struct InstallationOrchestrator {
    registry: Arc<ApplicationRegistry>,
    inspector: BundleInspector,
    containers: Arc<dyn ContainerManager>,
    launcher: Arc<dyn Launcher>,
    policy: ProtectionPolicy,
}

impl fmt::Debug for InstallationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationOrchestrator")
            .field("registry", &self.registry)
            .field("inspector", &self.inspector)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl InstallationOrchestrator {
    /// Create an orchestrator with the default [`ProtectionPolicy`].
    #[must_use]
    pub fn new(
        registry: Arc<ApplicationRegistry>,
        inspector: BundleInspector,
        containers: Arc<dyn ContainerManager>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            registry,
            inspector,
            containers,
            launcher,
            policy: ProtectionPolicy::default(),
        }
    }

    /// Replace the protection policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ProtectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ApplicationRegistry> {
        &self.registry
    }

    /// The active protection policy.
    #[must_use]
    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    /// Install the bundle at `bundle_source`.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::Inspect`] if the bundle is malformed, lacks its
    ///   executable, or fails signing (nothing written)
    /// - [`OrchestratorError::Registry`] with `DuplicateIdentifier` if an
    ///   installed record exists and `overwrite_existing` is off
    /// - [`OrchestratorError::Staging`] if copying fails (partial files removed)
    /// - [`OrchestratorError::Registry`] if the index cannot be written
    ///   (staged files removed)
    pub fn install(
        &self,
        bundle_source: &Path,
        options: InstallOptions,
    ) -> OrchestratorResult<InstallOutcome> {
        let span = info_span!(
            "install",
            source = %bundle_source.display(),
            overwrite = options.overwrite_existing,
            placeholder = options.placeholder,
        );
        let _enter = span.enter();

        self.install_recording(bundle_source, options, &mut PhaseLog::new())
    }

    /// [`Self::install`] with the phase history kept by the caller, so a
    /// failed install still shows how far it got.
    fn install_recording(
        &self,
        bundle_source: &Path,
        options: InstallOptions,
        phases: &mut PhaseLog,
    ) -> OrchestratorResult<InstallOutcome> {
        let mut registry = self.registry.write()?;

        phases.advance(InstallPhase::Inspecting);
        let inspected = if options.placeholder {
            self.inspector.inspect_placeholder(bundle_source)
        } else {
            self.inspector.inspect(bundle_source)
        };
        let mut record = match inspected {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Bundle inspection failed");
                phases.advance(InstallPhase::Failed);
                return Err(e.into());
            },
        };
        let id = record.application_identifier.clone();

        let existing = registry.get(&id).cloned();
        if let Some(current) = &existing
            && current.is_installed
            && !options.overwrite_existing
        {
            warn!(app_id = %id, "Application already installed");
            phases.advance(InstallPhase::Failed);
            return Err(RegistryError::DuplicateIdentifier(id).into());
        }

        phases.advance(InstallPhase::Staging);
        let staged = match self.containers.stage(bundle_source, &id) {
            Ok(staged) => staged,
            Err(e) => {
                warn!(app_id = %id, error = %e, "Staging failed");
                phases.advance(InstallPhase::RollingBack);
                phases.advance(InstallPhase::Idle);
                return Err(e.into());
            },
        };

        // An update keeps the application's existing data container.
        let kept_container = existing
            .as_ref()
            .map(|prev| prev.container_url.clone())
            .filter(|path| path.is_dir());
        record.bundle_url = staged.bundle_url.clone();
        record.container_url = kept_container
            .clone()
            .unwrap_or_else(|| staged.container_url.clone());

        phases.advance(InstallPhase::Registering);
        let registered = if options.overwrite_existing {
            registry.replace(record.clone())
        } else {
            registry.insert(record.clone()).map(|()| existing.clone())
        };
        let replaced = match registered {
            Ok(replaced) => replaced,
            Err(e) => {
                warn!(app_id = %id, error = %e, "Registration failed");
                phases.advance(InstallPhase::RollingBack);
                self.discard_staged(&id, &staged);
                phases.advance(InstallPhase::Idle);
                return Err(e.into());
            },
        };
        phases.advance(InstallPhase::Committed);
        info!(
            app_id = %id,
            bundle = %record.bundle_url.display(),
            replaced = replaced.is_some(),
            "Installed application"
        );

        let mut failures = Vec::new();
        if kept_container.is_some() {
            self.try_remove_container(&staged.container_url, &mut failures);
        }
        if let Some(prev) = &replaced
            && prev.bundle_url != record.bundle_url
        {
            self.try_remove_bundle(&prev.bundle_url, &mut failures);
        }
        let incomplete_cleanup = IncompleteCleanup::from_failures(&id, failures);
        if let Some(cleanup) = &incomplete_cleanup {
            warn!(app_id = %id, "{cleanup}");
        }

        Ok(InstallOutcome {
            record,
            replaced,
            phases: phases.phases.clone(),
            incomplete_cleanup,
        })
    }

    /// Uninstall an application.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::Registry`] with `NotFound` if no record exists
    /// - [`OrchestratorError::ProtectedApplication`] if policy forbids it
    /// - [`OrchestratorError::Registry`] if the index cannot be written
    pub fn uninstall(
        &self,
        id: &ApplicationId,
        options: UninstallOptions,
    ) -> OrchestratorResult<UninstallOutcome> {
        let span = info_span!(
            "uninstall",
            app_id = %id,
            preserve_container = options.preserve_container,
        );
        let _enter = span.enter();

        let mut registry = self.registry.write()?;
        let record = registry.lookup(id)?;

        if let Some(reason) = self.policy.protection_reason(&record) {
            warn!(reason = %reason, "Refusing to uninstall protected application");
            return Err(OrchestratorError::ProtectedApplication {
                id: id.clone(),
                reason,
            });
        }

        registry.remove(id)?;
        info!("Removed application from registry");

        let mut failures = Vec::new();
        self.try_remove_bundle(&record.bundle_url, &mut failures);
        if !options.preserve_container && !record.container_url.as_os_str().is_empty() {
            self.try_remove_container(&record.container_url, &mut failures);
        }
        let incomplete_cleanup = IncompleteCleanup::from_failures(id, failures);
        if let Some(cleanup) = &incomplete_cleanup {
            warn!("{cleanup}");
        }

        Ok(UninstallOutcome {
            record,
            incomplete_cleanup,
        })
    }

    /// Launch an installed application.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::Registry`] with `NotFound` if no record exists
    /// - [`OrchestratorError::LaunchProhibited`] if the record forbids launching
    /// - [`OrchestratorError::Launch`] if the launcher fails
    pub fn launch(&self, id: &ApplicationId) -> OrchestratorResult<()> {
        let span = info_span!("launch", app_id = %id);
        let _enter = span.enter();

        let record = self.registry.lookup(id)?;
        if record.is_launch_prohibited || !record.is_installed {
            warn!("Launch prohibited");
            return Err(OrchestratorError::LaunchProhibited(id.clone()));
        }

        let request = LaunchRequest::for_record(&record)?;
        self.launcher.launch(&request)?;
        Ok(())
    }

    /// Re-inspect an application's bundle in place and replace its record,
    /// refreshing the entitlement and manifest snapshots.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::Registry`] with `NotFound` if no record exists
    /// - [`OrchestratorError::Inspect`] if the bundle no longer inspects
    /// - [`OrchestratorError::Registry`] with `DuplicateIdentifier` if the
    ///   bundle now declares a different identity
    pub fn reregister(&self, id: &ApplicationId) -> OrchestratorResult<ApplicationRecord> {
        let span = info_span!("reregister", app_id = %id);
        let _enter = span.enter();

        let mut registry = self.registry.write()?;
        let current = registry.lookup(id)?;

        let mut fresh = if current.is_placeholder {
            self.inspector.inspect_placeholder(&current.bundle_url)?
        } else {
            self.inspector.inspect(&current.bundle_url)?
        };
        if fresh.application_identifier != current.application_identifier
            || fresh.bundle_identifier != current.bundle_identifier
        {
            warn!(
                found = %fresh.application_identifier,
                bundle_identifier = %fresh.bundle_identifier,
                "Bundle identity changed on disk"
            );
            return Err(RegistryError::DuplicateIdentifier(fresh.application_identifier).into());
        }

        fresh.container_url = current.container_url;
        registry.replace(fresh.clone())?;
        info!("Re-registered application");
        Ok(fresh)
    }

    /// Check installed records against the filesystem. Read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn verify_integrity(&self) -> OrchestratorResult<Vec<IntegrityViolation>> {
        let registry = self.registry.read()?;
        let mut violations = Vec::new();

        for record in registry.entries().iter().filter(|r| r.is_installed) {
            let violation = |kind, path: &Path| IntegrityViolation {
                application_identifier: record.application_identifier.clone(),
                kind,
                path: path.to_path_buf(),
            };

            if record.bundle_url.is_dir() {
                if let Some(exe) = record.executable_path()
                    && !exe.is_file()
                {
                    violations.push(violation(IntegrityViolationKind::MissingExecutable, &exe));
                }
            } else {
                violations.push(violation(
                    IntegrityViolationKind::MissingBundle,
                    &record.bundle_url,
                ));
            }

            if !record.container_url.is_dir() {
                violations.push(violation(
                    IntegrityViolationKind::MissingContainer,
                    &record.container_url,
                ));
            }
        }

        if !violations.is_empty() {
            warn!(count = violations.len(), "Registry integrity violations found");
        }
        Ok(violations)
    }

    fn discard_staged(&self, id: &ApplicationId, staged: &StagedBundle) {
        let mut failures = Vec::new();
        self.try_remove_bundle(&staged.bundle_url, &mut failures);
        self.try_remove_container(&staged.container_url, &mut failures);
        for failure in &failures {
            error!(
                app_id = %id,
                path = %failure.path.display(),
                error = %failure.error,
                "Rollback left staged files behind"
            );
        }
    }

    fn try_remove_bundle(&self, path: &Path, failures: &mut Vec<CleanupFailure>) {
        if let Err(e) = self.containers.remove_bundle(path) {
            failures.push(CleanupFailure {
                path: path.to_path_buf(),
                error: e.to_string(),
            });
        }
    }

    fn try_remove_container(&self, path: &Path, failures: &mut Vec<CleanupFailure>) {
        if let Err(e) = self.containers.remove_container(path) {
            failures.push(CleanupFailure {
                path: path.to_path_buf(),
                error: e.to_string(),
            });
        }
    }
}
