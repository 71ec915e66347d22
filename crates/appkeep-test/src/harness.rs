//! A fully wired workspace under a temporary home.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use appkeep_core::AppkeepHome;
use appkeep_install::{
    BundleInspector, ContainerManager, InstallationOrchestrator, Launcher, ProtectionPolicy,
    TrustSubsystem, Workspace,
};
use appkeep_registry::ApplicationRegistry;

use crate::mocks::{MockContainers, MockLauncher, MockTrust};

/// Temporary home, mock collaborators, and the workspace built on them.
pub struct TestWorkspace {
    dir: TempDir,
    /// Home layout under the temporary directory.
    pub home: AppkeepHome,
    /// Trust mock handed to the inspector.
    pub trust: MockTrust,
    /// Container mock handed to the orchestrator.
    pub containers: MockContainers,
    /// Launcher mock handed to the orchestrator.
    pub launcher: MockLauncher,
    /// The shared registry.
    pub registry: Arc<ApplicationRegistry>,
    /// The facade under test.
    pub workspace: Workspace,
}

impl TestWorkspace {
    /// Build with the default protection policy.
    ///
    /// # Panics
    ///
    /// Panics if the temporary home cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(ProtectionPolicy::default())
    }

    /// Build with a specific protection policy.
    ///
    /// # Panics
    ///
    /// Panics if the temporary home cannot be created.
    #[must_use]
    pub fn with_policy(policy: ProtectionPolicy) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let home = AppkeepHome::from_path(dir.path().join("home"));
        home.ensure().expect("create home layout");
        std::fs::create_dir_all(dir.path().join("incoming")).expect("create source dir");

        let registry =
            Arc::new(ApplicationRegistry::open(home.index_path()).expect("open registry"));
        let trust = MockTrust::new();
        let containers = MockContainers::new(&home);
        let launcher = MockLauncher::new();

        let workspace = Self::build(&registry, &trust, &containers, &launcher, policy);
        Self {
            dir,
            home,
            trust,
            containers,
            launcher,
            registry,
            workspace,
        }
    }

    fn build(
        registry: &Arc<ApplicationRegistry>,
        trust: &MockTrust,
        containers: &MockContainers,
        launcher: &MockLauncher,
        policy: ProtectionPolicy,
    ) -> Workspace {
        let inspector = BundleInspector::new(Arc::new(trust.clone()) as Arc<dyn TrustSubsystem>);
        let orchestrator = InstallationOrchestrator::new(
            Arc::clone(registry),
            inspector,
            Arc::new(containers.clone()) as Arc<dyn ContainerManager>,
            Arc::new(launcher.clone()) as Arc<dyn Launcher>,
        )
        .with_policy(policy);
        Workspace::new(Arc::new(orchestrator))
    }

    /// Directory where tests write source bundles.
    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.dir.path().join("incoming")
    }

    /// Root of the temporary directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// A second workspace over a freshly opened registry on the same home,
    /// as another process would see it.
    ///
    /// # Panics
    ///
    /// Panics if the index cannot be read.
    #[must_use]
    pub fn reopen(&self) -> Workspace {
        let registry =
            Arc::new(ApplicationRegistry::open(self.home.index_path()).expect("reopen registry"));
        Self::build(
            &registry,
            &self.trust,
            &self.containers,
            &self.launcher,
            ProtectionPolicy::default(),
        )
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call takes effect.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
