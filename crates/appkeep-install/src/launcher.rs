//! Process-launch boundary.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use appkeep_core::{ApplicationId, ApplicationRecord};

use crate::error::{LaunchError, LaunchResult};

/// Environment variable carrying the bundle identifier of a launched process.
pub const BUNDLE_ID_ENV_VAR: &str = "APPKEEP_BUNDLE_ID";
/// Environment variable carrying the data container path of a launched process.
pub const CONTAINER_ENV_VAR: &str = "APPKEEP_CONTAINER";

/// Everything a launcher needs to start an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Registry key.
    pub application_identifier: ApplicationId,
    /// Bundle identifier.
    pub bundle_identifier: String,
    /// Absolute path to the executable.
    pub executable: PathBuf,
    /// Data container for the process.
    pub container_url: PathBuf,
}

impl LaunchRequest {
    /// Build a request from a record.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::NoExecutable`] if the record declares none.
    pub fn for_record(record: &ApplicationRecord) -> LaunchResult<Self> {
        let executable = record
            .executable_path()
            .ok_or_else(|| LaunchError::NoExecutable(record.application_identifier.clone()))?;
        Ok(Self {
            application_identifier: record.application_identifier.clone(),
            bundle_identifier: record.bundle_identifier.clone(),
            executable,
            container_url: record.container_url.clone(),
        })
    }
}

/// Starts application processes.
pub trait Launcher: Send + Sync {
    /// Start the application described by `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] if the process cannot be started.
    fn launch(&self, request: &LaunchRequest) -> LaunchResult<()>;
}

/// Spawns the executable as a child process, reaped on a background thread
/// when it exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Create a launcher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher {
    /// Spawn the process and hand it to a reaper thread. Returns the pid.
    fn spawn(request: &LaunchRequest) -> LaunchResult<u32> {
        let mut cmd = Command::new(&request.executable);
        cmd.env(BUNDLE_ID_ENV_VAR, &request.bundle_identifier)
            .env(CONTAINER_ENV_VAR, &request.container_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if request.container_url.is_dir() {
            cmd.current_dir(&request.container_url);
        }

        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            path: request.executable.clone(),
            source,
        })?;
        let pid = child.id();
        let app_id = request.application_identifier.clone();

        // The reaper owns the child until it exits.
        let reaper = std::thread::Builder::new()
            .name(format!("appkeep-reap-{pid}"))
            .spawn(move || match child.wait() {
                Ok(status) => debug!(app_id = %app_id, pid, %status, "Application exited"),
                Err(e) => warn!(app_id = %app_id, pid, error = %e, "Failed to reap application"),
            });
        if let Err(e) = reaper {
            warn!(pid, error = %e, "Failed to start reaper thread");
        }

        Ok(pid)
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, request: &LaunchRequest) -> LaunchResult<()> {
        let pid = Self::spawn(request)?;
        info!(
            app_id = %request.application_identifier,
            pid,
            "Launched application"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_reports_path() {
        let request = LaunchRequest {
            application_identifier: ApplicationId::from_static("com.example.app"),
            bundle_identifier: "com.example.app".into(),
            executable: PathBuf::from("/nonexistent/appkeep/Example"),
            container_url: PathBuf::from("/nonexistent/appkeep/container"),
        };
        let err = ProcessLauncher::new().launch(&request).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/appkeep/Example"));
    }

    #[cfg(unix)]
    #[test]
    fn launches_executable_with_environment() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("container");
        std::fs::create_dir_all(&container).unwrap();
        let marker = dir.path().join("launched");
        let script = dir.path().join("Example");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '%s' \"${BUNDLE_ID_ENV_VAR}\" > '{}'\n",
                marker.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let request = LaunchRequest {
            application_identifier: ApplicationId::from_static("com.example.app"),
            bundle_identifier: "com.example.app".into(),
            executable: script,
            container_url: container,
        };
        ProcessLauncher::new().launch(&request).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !marker.exists() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        // The file may exist before the write completes; poll for content.
        let mut content = String::new();
        while std::time::Instant::now() < deadline {
            content = std::fs::read_to_string(&marker).unwrap_or_default();
            if !content.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert_eq!(content, "com.example.app");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn exited_application_is_reaped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("Example");
        std::fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let request = LaunchRequest {
            application_identifier: ApplicationId::from_static("com.example.app"),
            bundle_identifier: "com.example.app".into(),
            executable: script,
            container_url: dir.path().join("container"),
        };
        let pid = ProcessLauncher::spawn(&request).unwrap();

        // An unreaped child stays in the process table as a zombie.
        let proc_entry = PathBuf::from(format!("/proc/{pid}"));
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while proc_entry.exists() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(!proc_entry.exists(), "child {pid} was not reaped");
    }
}
