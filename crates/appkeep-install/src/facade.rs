//! Public entry point for front ends.
//!
//! [`Workspace`] holds no state of its own. It maps each call onto the
//! shared orchestrator or registry and translates internal errors into a
//! single [`WorkspaceError`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use appkeep_config::Config;
use appkeep_core::{
    AppSummary, AppkeepHome, ApplicationFilter, ApplicationId, ApplicationRecord, ApplicationType,
};
use appkeep_registry::{ApplicationRegistry, RegistryError};

use crate::container::FsContainerManager;
use crate::error::{InspectError, OrchestratorError, SigningError};
use crate::inspector::BundleInspector;
use crate::launcher::ProcessLauncher;
use crate::orchestrator::{
    InstallOptions, InstallOutcome, InstallationOrchestrator, IntegrityViolation,
    UninstallOptions, UninstallOutcome,
};
use crate::policy::ProtectionPolicy;
use crate::trust::EmbeddedSignatureVerifier;

/// Error categories exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkspaceErrorKind {
    /// The bundle manifest is missing or invalid.
    MalformedBundle,
    /// The declared executable is absent.
    MissingExecutable,
    /// No signer could be reported for the bundle.
    SigningUnavailable,
    /// The bundle's signature is invalid.
    SigningError,
    /// An installed application already uses this identifier.
    DuplicateIdentifier,
    /// No such application.
    NotFound,
    /// Policy forbids removing this application.
    ProtectedApplication,
    /// The application may not be launched.
    LaunchProhibited,
    /// A filesystem operation failed.
    Io,
    /// The launcher failed.
    Launch,
    /// Configuration or internal state is unusable.
    Internal,
}

impl WorkspaceErrorKind {
    /// Stable name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedBundle => "MalformedBundle",
            Self::MissingExecutable => "MissingExecutable",
            Self::SigningUnavailable => "SigningUnavailable",
            Self::SigningError => "SigningError",
            Self::DuplicateIdentifier => "DuplicateIdentifier",
            Self::NotFound => "NotFound",
            Self::ProtectedApplication => "ProtectedApplication",
            Self::LaunchProhibited => "LaunchProhibited",
            Self::Io => "Io",
            Self::Launch => "Launch",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for WorkspaceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every [`Workspace`] operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct WorkspaceError {
    /// Category.
    pub kind: WorkspaceErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl WorkspaceError {
    fn new(kind: WorkspaceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn registry_kind(e: &RegistryError) -> WorkspaceErrorKind {
    match e {
        RegistryError::NotFound(_) => WorkspaceErrorKind::NotFound,
        RegistryError::DuplicateIdentifier(_) => WorkspaceErrorKind::DuplicateIdentifier,
        RegistryError::IndexError { .. } => WorkspaceErrorKind::Io,
        RegistryError::Poisoned(_) => WorkspaceErrorKind::Internal,
    }
}

impl From<RegistryError> for WorkspaceError {
    fn from(e: RegistryError) -> Self {
        Self::new(registry_kind(&e), e.to_string())
    }
}

impl From<OrchestratorError> for WorkspaceError {
    fn from(e: OrchestratorError) -> Self {
        let kind = match &e {
            OrchestratorError::Inspect(inner) => match inner {
                InspectError::MalformedBundle { .. } => WorkspaceErrorKind::MalformedBundle,
                InspectError::MissingExecutable { .. } => WorkspaceErrorKind::MissingExecutable,
                InspectError::Signing(SigningError::Unavailable { .. }) => {
                    WorkspaceErrorKind::SigningUnavailable
                },
                InspectError::Signing(SigningError::Rejected { .. }) => {
                    WorkspaceErrorKind::SigningError
                },
            },
            OrchestratorError::Registry(inner) => registry_kind(inner),
            OrchestratorError::Staging(_) => WorkspaceErrorKind::Io,
            OrchestratorError::ProtectedApplication { .. } => {
                WorkspaceErrorKind::ProtectedApplication
            },
            OrchestratorError::LaunchProhibited(_) => WorkspaceErrorKind::LaunchProhibited,
            OrchestratorError::Launch(_) => WorkspaceErrorKind::Launch,
        };
        Self::new(kind, e.to_string())
    }
}

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Enumerate, install, uninstall, and launch applications.
#[derive(Debug, Clone)]
pub struct Workspace {
    orchestrator: Arc<InstallationOrchestrator>,
}

impl Workspace {
    /// Wrap an existing orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<InstallationOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Open the workspace described by `config` with the default
    /// filesystem collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be resolved or created,
    /// the registry index cannot be read, or the install policy is invalid.
    pub fn open(config: &Config) -> WorkspaceResult<Self> {
        let home = match &config.paths.home {
            Some(root) => AppkeepHome::from_path(root.clone()),
            None => appkeep_config::resolve_home()
                .map(AppkeepHome::from_path)
                .map_err(|e| {
                    WorkspaceError::new(
                        WorkspaceErrorKind::Internal,
                        format!("cannot resolve appkeep home: {e}"),
                    )
                })?,
        };
        home.ensure().map_err(|e| {
            WorkspaceError::new(
                WorkspaceErrorKind::Io,
                format!("cannot create {}: {e}", home.root().display()),
            )
        })?;

        let policy = ProtectionPolicy::from_config(&config.install)
            .map_err(|e| WorkspaceError::new(WorkspaceErrorKind::Internal, e.to_string()))?;
        let registry = Arc::new(ApplicationRegistry::open(home.index_path())?);
        let inspector = BundleInspector::new(Arc::new(EmbeddedSignatureVerifier::new()))
            .with_require_signer(config.install.require_signer);

        let orchestrator = InstallationOrchestrator::new(
            registry,
            inspector,
            Arc::new(FsContainerManager::new(&home)),
            Arc::new(ProcessLauncher::new()),
        )
        .with_policy(policy);

        debug!(home = %home.root().display(), "Opened workspace");
        Ok(Self::new(Arc::new(orchestrator)))
    }

    /// The orchestrator behind this workspace.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<InstallationOrchestrator> {
        &self.orchestrator
    }

    /// Every registered application, placeholders included.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn all_applications(&self) -> WorkspaceResult<Vec<ApplicationRecord>> {
        Ok(self
            .orchestrator
            .registry()
            .enumerate(ApplicationFilter::Any, true)?)
    }

    /// Installed applications of exactly the given type.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn applications_of_type(
        &self,
        application_type: ApplicationType,
    ) -> WorkspaceResult<Vec<ApplicationRecord>> {
        let mut records = self
            .orchestrator
            .registry()
            .enumerate(ApplicationFilter::from(application_type), false)?;
        records.retain(|r| r.application_type == application_type);
        Ok(records)
    }

    /// Installed applications only.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn all_installed_applications(&self) -> WorkspaceResult<Vec<ApplicationRecord>> {
        Ok(self
            .orchestrator
            .registry()
            .enumerate(ApplicationFilter::Any, false)?)
    }

    /// Look up one application by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceErrorKind::NotFound`] if the identifier is invalid
    /// or unregistered.
    pub fn application_proxy_for_identifier(&self, id: &str) -> WorkspaceResult<ApplicationRecord> {
        let id = parse_id(id)?;
        Ok(self.orchestrator.registry().lookup(&id)?)
    }

    /// Presentation summaries of installed applications.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn installed_summaries(&self) -> WorkspaceResult<Vec<AppSummary>> {
        Ok(self
            .all_installed_applications()?
            .iter()
            .map(AppSummary::from)
            .collect())
    }

    /// Install a bundle.
    ///
    /// # Errors
    ///
    /// See [`InstallationOrchestrator::install`].
    pub fn install_application(
        &self,
        path: &Path,
        options: InstallOptions,
    ) -> WorkspaceResult<InstallOutcome> {
        Ok(self.orchestrator.install(path, options)?)
    }

    /// Uninstall an application.
    ///
    /// # Errors
    ///
    /// See [`InstallationOrchestrator::uninstall`].
    pub fn uninstall_application(
        &self,
        id: &str,
        options: UninstallOptions,
    ) -> WorkspaceResult<UninstallOutcome> {
        let id = parse_id(id)?;
        Ok(self.orchestrator.uninstall(&id, options)?)
    }

    /// Launch an application.
    ///
    /// `id` is matched against application identifiers first, then against
    /// the bundle identifiers of installed applications.
    ///
    /// # Errors
    ///
    /// See [`InstallationOrchestrator::launch`].
    pub fn open_application_with_bundle_id(&self, id: &str) -> WorkspaceResult<()> {
        let app_id = self.resolve_launch_target(id)?;
        Ok(self.orchestrator.launch(&app_id)?)
    }

    /// Re-inspect an installed bundle and refresh its record.
    ///
    /// # Errors
    ///
    /// See [`InstallationOrchestrator::reregister`].
    pub fn reregister_application(&self, id: &str) -> WorkspaceResult<ApplicationRecord> {
        let id = parse_id(id)?;
        Ok(self.orchestrator.reregister(&id)?)
    }

    /// Installed applications whose files no longer match the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn verify_integrity(&self) -> WorkspaceResult<Vec<IntegrityViolation>> {
        Ok(self.orchestrator.verify_integrity()?)
    }

    fn resolve_launch_target(&self, id: &str) -> WorkspaceResult<ApplicationId> {
        let registry = self.orchestrator.registry().read()?;
        if let Ok(app_id) = ApplicationId::new(id)
            && registry.get(&app_id).is_some()
        {
            return Ok(app_id);
        }
        registry
            .entries()
            .iter()
            .find(|r| r.is_installed && r.bundle_identifier == id)
            .map(|r| r.application_identifier.clone())
            .ok_or_else(|| {
                WorkspaceError::new(
                    WorkspaceErrorKind::NotFound,
                    format!("application not found: {id}"),
                )
            })
    }
}

fn parse_id(id: &str) -> WorkspaceResult<ApplicationId> {
    ApplicationId::new(id)
        .map_err(|e| WorkspaceError::new(WorkspaceErrorKind::NotFound, e.to_string()))
}
