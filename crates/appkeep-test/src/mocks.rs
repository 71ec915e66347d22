//! Mock collaborators for testing.
//!
//! Each mock is cheap to clone; clones share state, so a test can keep a
//! handle while the orchestrator owns another and flip switches between
//! calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use appkeep_core::{AppkeepHome, ApplicationId, Metadata};
use appkeep_install::{
    ContainerError, ContainerManager, ContainerResult, FsContainerManager, LaunchError,
    LaunchRequest, LaunchResult, Launcher, SigningError, SigningReport, SigningResult,
    StagedBundle, TrustSubsystem,
};

/// How [`MockTrust`] answers a verification request.
#[derive(Debug, Clone, PartialEq)]
pub enum TrustResponse {
    /// Report this signer.
    Signed(SigningReport),
    /// No signer can be reported.
    Unavailable,
    /// The signature is invalid.
    Rejected(String),
}

/// Mock trust subsystem.
///
/// Answers with a default signed report unless a response is configured for
/// the bundle's directory name or globally.
#[derive(Debug, Clone)]
pub struct MockTrust {
    default: Arc<Mutex<TrustResponse>>,
    by_item_name: Arc<Mutex<HashMap<String, TrustResponse>>>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockTrust {
    /// Trust every bundle, signed by `"Mock Signer"`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default: Arc::new(Mutex::new(TrustResponse::Signed(SigningReport {
                signer_identity: Some("Mock Signer".to_string()),
                team_id: Some("MOCKTEAM".to_string()),
                entitlements: Metadata::new(),
            }))),
            by_item_name: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every bundle without a specific response with `response`.
    #[must_use]
    pub fn with_default(self, response: TrustResponse) -> Self {
        if let Ok(mut guard) = self.default.lock() {
            *guard = response;
        }
        self
    }

    /// Answer bundles whose directory is named `item_name` with `response`.
    #[must_use]
    pub fn with_response(self, item_name: impl Into<String>, response: TrustResponse) -> Self {
        if let Ok(mut guard) = self.by_item_name.lock() {
            guard.insert(item_name.into(), response);
        }
        self
    }

    /// Paths passed to `verify`, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockTrust {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustSubsystem for MockTrust {
    fn verify(&self, bundle_path: &Path) -> SigningResult<SigningReport> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(bundle_path.to_path_buf());
        }

        let item_name = bundle_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let specific = self
            .by_item_name
            .lock()
            .ok()
            .and_then(|m| m.get(&item_name).cloned());
        let response = match specific {
            Some(r) => r,
            None => self
                .default
                .lock()
                .map(|d| d.clone())
                .unwrap_or(TrustResponse::Unavailable),
        };

        match response {
            TrustResponse::Signed(report) => Ok(report),
            TrustResponse::Unavailable => Err(SigningError::Unavailable {
                path: bundle_path.to_path_buf(),
            }),
            TrustResponse::Rejected(reason) => Err(SigningError::Rejected {
                path: bundle_path.to_path_buf(),
                reason,
            }),
        }
    }
}

/// Filesystem container manager with injectable failures.
///
/// Staging really copies bundles (so records point at real files); the
/// switches make individual operations fail.
#[derive(Debug, Clone)]
pub struct MockContainers {
    inner: FsContainerManager,
    fail_stage: Arc<AtomicBool>,
    fail_remove_bundle: Arc<AtomicBool>,
    fail_remove_container: Arc<AtomicBool>,
    stage_delay: Arc<Mutex<Option<Duration>>>,
    stage_calls: Arc<AtomicUsize>,
    removed: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockContainers {
    /// Containers rooted at `home`.
    #[must_use]
    pub fn new(home: &AppkeepHome) -> Self {
        Self {
            inner: FsContainerManager::new(home),
            fail_stage: Arc::new(AtomicBool::new(false)),
            fail_remove_bundle: Arc::new(AtomicBool::new(false)),
            fail_remove_container: Arc::new(AtomicBool::new(false)),
            stage_delay: Arc::new(Mutex::new(None)),
            stage_calls: Arc::new(AtomicUsize::new(0)),
            removed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every subsequent `stage` fail.
    pub fn set_fail_stage(&self, fail: bool) {
        self.fail_stage.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `remove_bundle` fail.
    pub fn set_fail_remove_bundle(&self, fail: bool) {
        self.fail_remove_bundle.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `remove_container` fail.
    pub fn set_fail_remove_container(&self, fail: bool) {
        self.fail_remove_container.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside every `stage`, after copying.
    pub fn set_stage_delay(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.stage_delay.lock() {
            *guard = delay;
        }
    }

    /// How many times `stage` has been called.
    #[must_use]
    pub fn stage_calls(&self) -> usize {
        self.stage_calls.load(Ordering::SeqCst)
    }

    /// Paths successfully removed, bundles and containers alike.
    #[must_use]
    pub fn removed(&self) -> Vec<PathBuf> {
        self.removed.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn injected(operation: &'static str, path: &Path) -> ContainerError {
        ContainerError::Io {
            operation,
            path: path.to_path_buf(),
            source: std::io::Error::other("injected failure"),
        }
    }

    fn note_removed(&self, path: &Path) {
        if let Ok(mut removed) = self.removed.lock() {
            removed.push(path.to_path_buf());
        }
    }
}

impl ContainerManager for MockContainers {
    fn stage(&self, bundle_source: &Path, id: &ApplicationId) -> ContainerResult<StagedBundle> {
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stage.load(Ordering::SeqCst) {
            return Err(ContainerError::Refused {
                id: id.clone(),
                reason: "injected failure".to_string(),
            });
        }
        let staged = self.inner.stage(bundle_source, id)?;
        let delay = self.stage_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(staged)
    }

    fn remove_bundle(&self, bundle_url: &Path) -> ContainerResult<()> {
        if self.fail_remove_bundle.load(Ordering::SeqCst) {
            return Err(Self::injected("remove bundle", bundle_url));
        }
        self.inner.remove_bundle(bundle_url)?;
        self.note_removed(bundle_url);
        Ok(())
    }

    fn remove_container(&self, container_url: &Path) -> ContainerResult<()> {
        if self.fail_remove_container.load(Ordering::SeqCst) {
            return Err(Self::injected("remove container", container_url));
        }
        self.inner.remove_container(container_url)?;
        self.note_removed(container_url);
        Ok(())
    }
}

/// Launcher that records requests instead of spawning processes.
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    launched: Arc<Mutex<Vec<LaunchRequest>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockLauncher {
    /// A launcher that accepts every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent launch with `reason`, or succeed again with
    /// `None`.
    pub fn set_failure(&self, reason: Option<String>) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = reason;
        }
    }

    /// Requests received, in order.
    #[must_use]
    pub fn launched(&self) -> Vec<LaunchRequest> {
        self.launched.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl Launcher for MockLauncher {
    fn launch(&self, request: &LaunchRequest) -> LaunchResult<()> {
        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        if let Some(reason) = failure {
            return Err(LaunchError::Failed {
                id: request.application_identifier.clone(),
                reason,
            });
        }
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(request.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_trust_per_bundle_response() {
        let trust =
            MockTrust::new().with_response("Bad.app", TrustResponse::Rejected("nope".into()));

        assert!(trust.verify(Path::new("/src/Good.app")).is_ok());
        assert!(matches!(
            trust.verify(Path::new("/src/Bad.app")),
            Err(SigningError::Rejected { .. })
        ));
        assert_eq!(trust.calls().len(), 2);
    }

    #[test]
    fn mock_launcher_failure_switch() {
        let launcher = MockLauncher::new();
        let request = LaunchRequest {
            application_identifier: ApplicationId::from_static("com.example.app"),
            bundle_identifier: "com.example.app".into(),
            executable: PathBuf::from("/b/App"),
            container_url: PathBuf::from("/c"),
        };

        launcher.launch(&request).unwrap();
        launcher.set_failure(Some("busy".into()));
        assert!(launcher.launch(&request).is_err());
        assert_eq!(launcher.launched().len(), 1);
    }
}
