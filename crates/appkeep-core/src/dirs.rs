//! Directory layout for appkeep state.
//!
//! # Layout
//!
//! ```text
//! ~/.appkeep/                       (AppkeepHome)
//! ├── registry/
//! │   ├── applications.toml           (durable application index)
//! │   └── applications.lk             (advisory lock for the index)
//! ├── bundles/                        (staged application bundles, one dir per install)
//! ├── containers/                     (per-application data containers)
//! ├── logs/                           (rolling log files)
//! └── config.toml                     (user configuration)
//! ```

use std::io;
use std::path::{Component, Path, PathBuf};

/// File name of the application index.
pub const INDEX_FILE_NAME: &str = "applications.toml";

/// Root of all appkeep state (`~/.appkeep/` or `$APPKEEP_HOME`).
///
/// The location itself is chosen by configuration loading; this type only
/// knows the layout beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppkeepHome {
    root: PathBuf,
}

impl AppkeepHome {
    /// Create from an explicit path.
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ensure the directory structure exists.
    ///
    /// Creates `registry/`, `bundles/`, `containers/` and `logs/`. On Unix
    /// the registry directory is restricted to the owner.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or permission setting fails.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.registry_dir())?;
        std::fs::create_dir_all(self.bundles_dir())?;
        std::fs::create_dir_all(self.containers_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let owner_only = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(self.registry_dir(), owner_only)?;
        }
        Ok(())
    }

    /// Root directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registry directory (`~/.appkeep/registry/`).
    #[must_use]
    pub fn registry_dir(&self) -> PathBuf {
        self.root.join("registry")
    }

    /// Path to the durable application index.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.registry_dir().join(INDEX_FILE_NAME)
    }

    /// Directory holding staged bundles.
    #[must_use]
    pub fn bundles_dir(&self) -> PathBuf {
        self.root.join("bundles")
    }

    /// Directory holding data containers.
    #[must_use]
    pub fn containers_dir(&self) -> PathBuf {
        self.root.join("containers")
    }

    /// Logs directory.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// User configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}

/// Whether `name` is a non-empty relative path made only of normal
/// components, so joining it to a bundle directory stays inside it.
#[must_use]
pub fn is_bundle_relative(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let home = AppkeepHome::from_path("/var/appkeep");
        assert_eq!(home.root(), Path::new("/var/appkeep"));
        assert_eq!(
            home.index_path(),
            PathBuf::from("/var/appkeep/registry/applications.toml")
        );
        assert_eq!(home.bundles_dir(), PathBuf::from("/var/appkeep/bundles"));
        assert_eq!(
            home.containers_dir(),
            PathBuf::from("/var/appkeep/containers")
        );
        assert_eq!(home.config_path(), PathBuf::from("/var/appkeep/config.toml"));
    }

    #[test]
    fn ensure_creates_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let home = AppkeepHome::from_path(tmp.path().join("home"));
        home.ensure().unwrap();
        assert!(home.registry_dir().is_dir());
        assert!(home.bundles_dir().is_dir());
        assert!(home.containers_dir().is_dir());
        assert!(home.logs_dir().is_dir());
    }

    #[test]
    fn bundle_relative_names() {
        assert!(is_bundle_relative("Example"));
        assert!(is_bundle_relative("Resources/AppIcon"));
        assert!(!is_bundle_relative(""));
        assert!(!is_bundle_relative("../../etc/passwd"));
        assert!(!is_bundle_relative("Resources/../../x"));
        assert!(!is_bundle_relative("/etc/passwd"));
        assert!(!is_bundle_relative("./Example"));
    }
}
