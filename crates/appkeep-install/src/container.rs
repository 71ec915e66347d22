//! Bundle-container manager boundary and the filesystem implementation.
//!
//! Layout under the appkeep home:
//!
//! ```text
//! bundles/
//!   .staging-<uuid>/          in-flight copy, removed on failure
//!   <uuid>/
//!     .appkeep-managed        marker
//!     <item_name>/            the staged bundle
//! containers/
//!   <uuid>/                   writable data container
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use appkeep_core::{AppkeepHome, ApplicationId};

use crate::error::{ContainerError, ContainerResult};

/// Marker file written next to every staged bundle.
pub const MANAGED_MARKER: &str = ".appkeep-managed";

/// Prefix of in-flight staging directories.
const STAGING_PREFIX: &str = ".staging-";

/// Where a bundle landed after staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBundle {
    /// Final bundle location.
    pub bundle_url: PathBuf,
    /// Freshly created data container.
    pub container_url: PathBuf,
}

/// Places bundles into their final location and removes them again.
pub trait ContainerManager: Send + Sync {
    /// Copy `bundle_source` into a new managed location for `id` and create
    /// its data container. On failure no partial files remain.
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`] if any filesystem step fails.
    fn stage(&self, bundle_source: &Path, id: &ApplicationId) -> ContainerResult<StagedBundle>;

    /// Delete a staged bundle.
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`] if deletion fails.
    fn remove_bundle(&self, bundle_url: &Path) -> ContainerResult<()>;

    /// Delete a data container.
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`] if deletion fails.
    fn remove_container(&self, container_url: &Path) -> ContainerResult<()>;
}

/// Stages bundles under an [`AppkeepHome`].
#[derive(Debug, Clone)]
pub struct FsContainerManager {
    bundles_dir: PathBuf,
    containers_dir: PathBuf,
}

impl FsContainerManager {
    /// Manager rooted at the home's `bundles/` and `containers/` directories.
    #[must_use]
    pub fn new(home: &AppkeepHome) -> Self {
        Self {
            bundles_dir: home.bundles_dir(),
            containers_dir: home.containers_dir(),
        }
    }

    fn io(
        operation: &'static str,
        path: &Path,
    ) -> impl FnOnce(std::io::Error) -> ContainerError + use<> {
        let path = path.to_path_buf();
        move |source| ContainerError::Io {
            operation,
            path,
            source,
        }
    }

    fn stage_into(
        &self,
        bundle_source: &Path,
        staging: &Path,
        item_name: &str,
        install_id: &str,
    ) -> ContainerResult<StagedBundle> {
        let staged_bundle = staging.join(item_name);
        copy_bundle_dir(bundle_source, &staged_bundle)?;
        std::fs::write(staging.join(MANAGED_MARKER), b"")
            .map_err(Self::io("write marker", staging))?;

        let final_dir = self.bundles_dir.join(install_id);
        std::fs::rename(staging, &final_dir).map_err(Self::io("rename staging dir", &final_dir))?;

        let container_url = self.containers_dir.join(install_id);
        if let Err(e) = std::fs::create_dir_all(&container_url) {
            if let Err(cleanup) = std::fs::remove_dir_all(&final_dir) {
                warn!(
                    path = %final_dir.display(),
                    error = %cleanup,
                    "Failed to remove staged bundle"
                );
            }
            return Err(Self::io("create container", &container_url)(e));
        }

        Ok(StagedBundle {
            bundle_url: final_dir.join(item_name),
            container_url,
        })
    }
}

impl ContainerManager for FsContainerManager {
    fn stage(&self, bundle_source: &Path, id: &ApplicationId) -> ContainerResult<StagedBundle> {
        let item_name = bundle_source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ContainerError::Refused {
                id: id.clone(),
                reason: format!("{} has no file name", bundle_source.display()),
            })?;

        std::fs::create_dir_all(&self.bundles_dir)
            .map_err(Self::io("create bundles dir", &self.bundles_dir))?;

        let install_id = Uuid::new_v4().to_string();
        let staging = self
            .bundles_dir
            .join(format!("{STAGING_PREFIX}{install_id}"));

        match self.stage_into(bundle_source, &staging, &item_name, &install_id) {
            Ok(staged) => {
                debug!(
                    app_id = %id,
                    bundle = %staged.bundle_url.display(),
                    container = %staged.container_url.display(),
                    "Staged bundle"
                );
                Ok(staged)
            },
            Err(e) => {
                if staging.exists()
                    && let Err(cleanup) = std::fs::remove_dir_all(&staging)
                {
                    warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "Failed to remove partial staging directory"
                    );
                }
                Err(e)
            },
        }
    }

    fn remove_bundle(&self, bundle_url: &Path) -> ContainerResult<()> {
        // Managed bundles are removed with their `<uuid>` parent.
        let target = match bundle_url.parent() {
            Some(parent) if parent.join(MANAGED_MARKER).is_file() => parent,
            _ => bundle_url,
        };
        match std::fs::remove_dir_all(target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io("remove bundle", target)(e)),
        }
    }

    fn remove_container(&self, container_url: &Path) -> ContainerResult<()> {
        match std::fs::remove_dir_all(container_url) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io("remove container", container_url)(e)),
        }
    }
}

/// Whether `bundle_path` lives in a container written by
/// [`FsContainerManager`].
#[must_use]
pub fn is_managed_install(bundle_path: &Path) -> bool {
    bundle_path
        .parent()
        .is_some_and(|parent| parent.join(MANAGED_MARKER).is_file())
}

/// Recursively copy a bundle directory, refusing symlinks.
fn copy_bundle_dir(src: &Path, dst: &Path) -> ContainerResult<()> {
    std::fs::create_dir_all(dst).map_err(FsContainerManager::io("create directory", dst))?;

    for entry in std::fs::read_dir(src).map_err(FsContainerManager::io("read directory", src))? {
        let entry = entry.map_err(FsContainerManager::io("read directory", src))?;
        let src_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(FsContainerManager::io("stat", &src_path))?;
        let dst_path = dst.join(entry.file_name());

        if file_type.is_symlink() {
            return Err(ContainerError::SymlinkRejected { path: src_path });
        }

        if file_type.is_dir() {
            copy_bundle_dir(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).map_err(FsContainerManager::io("copy", &src_path))?;
        }
    }
    Ok(())
}
