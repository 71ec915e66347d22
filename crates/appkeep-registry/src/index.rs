//! Durable application index.
//!
//! The index (`registry/applications.toml`) maps application identifiers to
//! serialized [`ApplicationRecord`]s. It is consulted by processes outside
//! this one (e.g. a system launcher), so every write goes through a temp
//! file in the same directory, is fsynced, and is renamed over the old file
//! while holding an exclusive advisory lock on the `.lk` sibling. Readers
//! take a shared lock on the same sibling.
//!
//! # Format
//!
//! TOML with `schema_version = 1` and a flat `[[application]]` array.
//! Array order is registration order.

use std::io::Write;
use std::path::Path;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use appkeep_core::{ApplicationFilter, ApplicationId, ApplicationRecord};

use crate::error::{RegistryError, RegistryResult};

/// Current index schema version.
pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// The full set of registered application records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryIndex {
    /// Schema version for forward compatibility.
    schema_version: u32,
    /// Records in registration order.
    #[serde(default, rename = "application")]
    entries: Vec<ApplicationRecord>,
}

impl RegistryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            entries: Vec::new(),
        }
    }

    /// Load an index from disk under a shared lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> RegistryResult<Self> {
        let _lock_guard = acquire_lock_file(path, LockMode::Shared)?;

        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::IndexError {
            path: path.to_path_buf(),
            message: format!("failed to read index: {e}"),
        })?;

        Self::parse_content(path, &content)
    }

    /// Load an index from disk, returning an empty index if the file does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> RegistryResult<Self> {
        let _lock_guard = acquire_lock_file(path, LockMode::Shared)?;

        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse_content(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(RegistryError::IndexError {
                path: path.to_path_buf(),
                message: format!("failed to read index: {e}"),
            }),
        }
    }

    fn parse_content(path: &Path, content: &str) -> RegistryResult<Self> {
        let index: Self = toml::from_str(content).map_err(|e| RegistryError::IndexError {
            path: path.to_path_buf(),
            message: format!("failed to parse index: {e}"),
        })?;

        if index.schema_version != INDEX_SCHEMA_VERSION {
            warn!(
                path = %path.display(),
                found = index.schema_version,
                expected = INDEX_SCHEMA_VERSION,
                "Index schema version mismatch, attempting best-effort load"
            );
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &index.entries {
            if !seen.insert(&entry.application_identifier) {
                return Err(RegistryError::IndexError {
                    path: path.to_path_buf(),
                    message: format!(
                        "duplicate entry for {} in index",
                        entry.application_identifier
                    ),
                });
            }
        }

        debug!(
            path = %path.display(),
            entries = index.entries.len(),
            "Loaded application index"
        );

        Ok(index)
    }

    /// Save the index to disk atomically under an exclusive lock.
    ///
    /// Creates parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> RegistryResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RegistryError::IndexError {
                path: path.to_path_buf(),
                message: format!("failed to create parent directory: {e}"),
            })?;
        }

        let _lock_guard = acquire_lock_file(path, LockMode::Exclusive)?;
        self.save_inner(path)
    }

    /// Write to a temp file next to `path`, fsync, then rename into place.
    /// Caller must hold the exclusive lock.
    fn save_inner(&self, path: &Path) -> RegistryResult<()> {
        let header = "# Managed by appkeep. Do not edit while the registry is running.\n\n";
        let body = toml::to_string_pretty(self).map_err(|e| RegistryError::IndexError {
            path: path.to_path_buf(),
            message: format!("failed to serialize index: {e}"),
        })?;

        let parent = path.parent().unwrap_or(Path::new("."));
        let mut tmp =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| RegistryError::IndexError {
                path: path.to_path_buf(),
                message: format!("failed to create temp file for atomic write: {e}"),
            })?;

        tmp.write_all(header.as_bytes())
            .and_then(|()| tmp.write_all(body.as_bytes()))
            .map_err(|e| RegistryError::IndexError {
                path: path.to_path_buf(),
                message: format!("failed to write temp index: {e}"),
            })?;

        // A rename of unsynced data can surface as an empty file after power loss.
        tmp.as_file()
            .sync_all()
            .map_err(|e| RegistryError::IndexError {
                path: path.to_path_buf(),
                message: format!("failed to sync temp index to disk: {e}"),
            })?;

        tmp.persist(path).map_err(|e| RegistryError::IndexError {
            path: path.to_path_buf(),
            message: format!("failed to atomically replace index: {e}"),
        })?;

        debug!(path = %path.display(), entries = self.entries.len(), "Saved application index");
        Ok(())
    }

    /// Add a record, or replace the record with the same identifier in its
    /// existing slot. Returns the replaced record, if any.
    pub fn upsert(&mut self, record: ApplicationRecord) -> Option<ApplicationRecord> {
        match self.position(&record.application_identifier) {
            Some(pos) => Some(std::mem::replace(&mut self.entries[pos], record)),
            None => {
                self.entries.push(record);
                None
            },
        }
    }

    /// Remove a record by identifier, returning it if present.
    pub fn remove(&mut self, id: &ApplicationId) -> Option<ApplicationRecord> {
        self.position(id).map(|pos| self.entries.remove(pos))
    }

    /// Look up a record by identifier.
    #[must_use]
    pub fn get(&self, id: &ApplicationId) -> Option<&ApplicationRecord> {
        self.entries
            .iter()
            .find(|e| e.application_identifier == *id)
    }

    /// Records matching `filter`, in registration order.
    ///
    /// Records with `is_installed = false` are only included when
    /// `include_uninstalled` is set.
    #[must_use]
    pub fn enumerate(
        &self,
        filter: ApplicationFilter,
        include_uninstalled: bool,
    ) -> Vec<ApplicationRecord> {
        self.entries
            .iter()
            .filter(|e| include_uninstalled || e.is_installed)
            .filter(|e| filter.matches(e.application_type))
            .cloned()
            .collect()
    }

    /// All records in registration order.
    #[must_use]
    pub fn entries(&self) -> &[ApplicationRecord] {
        &self.entries
    }

    /// Whether the index has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn position(&self, id: &ApplicationId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.application_identifier == *id)
    }
}

impl Default for RegistryIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether to acquire a shared (read) or exclusive (write) lock.
#[derive(Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Acquire an advisory lock on the `.lk` sibling of `index_path`.
///
/// The returned file holds the lock until dropped. In shared mode a missing
/// lock file means no writer has ever run, so no lock is taken and `None`
/// is returned.
fn acquire_lock_file(index_path: &Path, mode: LockMode) -> RegistryResult<Option<std::fs::File>> {
    let lock_path = index_path.with_extension("lk");

    match mode {
        LockMode::Shared => match std::fs::OpenOptions::new().read(true).open(&lock_path) {
            Ok(lock_file) => {
                lock_file
                    .lock_shared()
                    .map_err(|e| RegistryError::IndexError {
                        path: index_path.to_path_buf(),
                        message: format!("failed to acquire shared file lock: {e}"),
                    })?;
                Ok(Some(lock_file))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegistryError::IndexError {
                path: index_path.to_path_buf(),
                message: format!("failed to open lock file: {e}"),
            }),
        },
        LockMode::Exclusive => {
            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .read(true)
                .open(&lock_path)
                .map_err(|e| RegistryError::IndexError {
                    path: index_path.to_path_buf(),
                    message: format!("failed to open lock file: {e}"),
                })?;

            lock_file
                .lock_exclusive()
                .map_err(|e| RegistryError::IndexError {
                    path: index_path.to_path_buf(),
                    message: format!("failed to acquire exclusive file lock: {e}"),
                })?;

            Ok(Some(lock_file))
        },
    }
}
