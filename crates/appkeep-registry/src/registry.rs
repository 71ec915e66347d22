//! Process-wide, lock-protected view of the application index.
//!
//! One [`ApplicationRegistry`] is constructed at startup and shared (via
//! `Arc`) by every component that reads or mutates registrations.
//!
//! Mutations are copy-on-write: the index is cloned, the change applied to
//! the clone, the clone persisted, and only then swapped into memory. A
//! failed persist leaves both the in-memory and on-disk state untouched.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use appkeep_core::{ApplicationFilter, ApplicationId, ApplicationRecord};

use crate::error::{RegistryError, RegistryResult};
use crate::index::RegistryIndex;

/// Shared registry of application records.
///
/// Readers share the lock; a writer holds it exclusively for as long as it
/// keeps the [`RegistryWriteGuard`], which lets a caller serialize an entire
/// multi-step workflow against every other reader and writer.
#[derive(Debug)]
pub struct ApplicationRegistry {
    index_path: Option<PathBuf>,
    state: RwLock<RegistryIndex>,
}

impl ApplicationRegistry {
    /// Open the registry backed by the index file at `index_path`.
    ///
    /// A missing file yields an empty registry; the file is created on the
    /// first mutation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IndexError`] if the file exists but cannot be
    /// read or parsed.
    pub fn open(index_path: impl Into<PathBuf>) -> RegistryResult<Self> {
        let index_path = index_path.into();
        let index = RegistryIndex::load_or_default(&index_path)?;
        info!(
            path = %index_path.display(),
            applications = index.len(),
            "Opened application registry"
        );
        Ok(Self {
            index_path: Some(index_path),
            state: RwLock::new(index),
        })
    }

    /// A registry that is never persisted.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            index_path: None,
            state: RwLock::new(RegistryIndex::new()),
        }
    }

    /// Path of the backing index file, if persisted.
    #[must_use]
    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    /// Acquire a shared read guard.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] if a writer panicked.
    pub fn read(&self) -> RegistryResult<RegistryReadGuard<'_>> {
        let guard = self
            .state
            .read()
            .map_err(|e| RegistryError::Poisoned(e.to_string()))?;
        Ok(RegistryReadGuard { guard })
    }

    /// Acquire the exclusive write guard, blocking until all readers and
    /// any other writer have released the lock.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] if a writer panicked.
    pub fn write(&self) -> RegistryResult<RegistryWriteGuard<'_>> {
        let guard = self
            .state
            .write()
            .map_err(|e| RegistryError::Poisoned(e.to_string()))?;
        Ok(RegistryWriteGuard {
            guard,
            index_path: self.index_path.as_deref(),
        })
    }

    /// Re-read the index from disk, picking up changes made by other
    /// processes. No-op for an in-memory registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or the lock is poisoned.
    pub fn reload(&self) -> RegistryResult<()> {
        let Some(path) = &self.index_path else {
            return Ok(());
        };
        let fresh = RegistryIndex::load_or_default(path)?;
        let mut guard = self
            .state
            .write()
            .map_err(|e| RegistryError::Poisoned(e.to_string()))?;
        *guard = fresh;
        debug!(path = %path.display(), "Reloaded application registry");
        Ok(())
    }

    /// Look up a record by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no record exists.
    pub fn lookup(&self, id: &ApplicationId) -> RegistryResult<ApplicationRecord> {
        self.read()?.lookup(id)
    }

    /// Records matching `filter` in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] if a writer panicked.
    pub fn enumerate(
        &self,
        filter: ApplicationFilter,
        include_uninstalled: bool,
    ) -> RegistryResult<Vec<ApplicationRecord>> {
        Ok(self.read()?.enumerate(filter, include_uninstalled))
    }

    /// Insert a record under a short-lived write lock.
    ///
    /// # Errors
    ///
    /// See [`RegistryWriteGuard::insert`].
    pub fn insert(&self, record: ApplicationRecord) -> RegistryResult<()> {
        self.write()?.insert(record)
    }

    /// Remove a record under a short-lived write lock.
    ///
    /// # Errors
    ///
    /// See [`RegistryWriteGuard::remove`].
    pub fn remove(&self, id: &ApplicationId) -> RegistryResult<ApplicationRecord> {
        self.write()?.remove(id)
    }
}

/// Shared read access to the index.
pub struct RegistryReadGuard<'a> {
    guard: RwLockReadGuard<'a, RegistryIndex>,
}

impl RegistryReadGuard<'_> {
    /// Look up a record by identifier, returning a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no record exists.
    pub fn lookup(&self, id: &ApplicationId) -> RegistryResult<ApplicationRecord> {
        self.guard
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }
}

impl Deref for RegistryReadGuard<'_> {
    type Target = RegistryIndex;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Exclusive access to the index.
///
/// Reads through [`Deref`]; every mutation persists before it becomes
/// visible in memory.
pub struct RegistryWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, RegistryIndex>,
    index_path: Option<&'a Path>,
}

impl RegistryWriteGuard<'_> {
    /// Look up a record by identifier, returning a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no record exists.
    pub fn lookup(&self, id: &ApplicationId) -> RegistryResult<ApplicationRecord> {
        self.guard
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Publish a record.
    ///
    /// An existing record with the same identifier is replaced in its slot
    /// only if it is not installed (e.g. a placeholder).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateIdentifier`] if an installed record
    /// with the same identifier exists, or [`RegistryError::IndexError`] if
    /// the index cannot be persisted.
    pub fn insert(&mut self, record: ApplicationRecord) -> RegistryResult<()> {
        if let Some(existing) = self.guard.get(&record.application_identifier)
            && existing.is_installed
        {
            return Err(RegistryError::DuplicateIdentifier(
                record.application_identifier.clone(),
            ));
        }
        let id = record.application_identifier.clone();
        self.commit(|index| {
            index.upsert(record);
        })?;
        debug!(app_id = %id, "Inserted application record");
        Ok(())
    }

    /// Publish a record, replacing any existing record with the same
    /// identifier regardless of its install state. Returns the replaced
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IndexError`] if the index cannot be persisted.
    pub fn replace(
        &mut self,
        record: ApplicationRecord,
    ) -> RegistryResult<Option<ApplicationRecord>> {
        let id = record.application_identifier.clone();
        let previous = self.commit(|index| index.upsert(record))?;
        debug!(app_id = %id, replaced = previous.is_some(), "Replaced application record");
        Ok(previous)
    }

    /// Delete a record, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no record exists, or
    /// [`RegistryError::IndexError`] if the index cannot be persisted.
    pub fn remove(&mut self, id: &ApplicationId) -> RegistryResult<ApplicationRecord> {
        if self.guard.get(id).is_none() {
            return Err(RegistryError::NotFound(id.clone()));
        }
        let removed = self
            .commit(|index| index.remove(id))?
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        debug!(app_id = %id, "Removed application record");
        Ok(removed)
    }

    /// Apply `mutate` to a copy of the index, persist the copy, then make it
    /// current.
    fn commit<T>(&mut self, mutate: impl FnOnce(&mut RegistryIndex) -> T) -> RegistryResult<T> {
        let mut next = self.guard.clone();
        let out = mutate(&mut next);
        if let Some(path) = self.index_path {
            next.save(path)?;
        }
        *self.guard = next;
        Ok(out)
    }
}

impl Deref for RegistryWriteGuard<'_> {
    type Target = RegistryIndex;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use appkeep_core::{ApplicationType, Metadata};
    use chrono::Utc;

    use super::*;

    fn record(id: &str, installed: bool) -> ApplicationRecord {
        ApplicationRecord {
            application_identifier: ApplicationId::from_static(id),
            bundle_identifier: id.to_string(),
            bundle_url: PathBuf::from(format!("/bundles/{id}/App.app")),
            container_url: PathBuf::from(format!("/containers/{id}")),
            bundle_executable: Some("App".into()),
            bundle_version: Some("1".into()),
            short_version_string: None,
            localized_name: None,
            localized_short_name: None,
            item_name: "App.app".into(),
            application_type: ApplicationType::User,
            signer_identity: None,
            team_id: None,
            is_installed: installed,
            is_placeholder: !installed,
            is_app_clip: false,
            is_launch_prohibited: false,
            registered_at: Utc::now(),
            entitlements: Metadata::new(),
            info_plist: Metadata::new(),
        }
    }

    fn temp_registry() -> (tempfile::TempDir, ApplicationRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            ApplicationRegistry::open(dir.path().join("registry").join("applications.toml"))
                .unwrap();
        (dir, registry)
    }

    #[test]
    fn insert_then_lookup() {
        let (_dir, registry) = temp_registry();
        registry.insert(record("com.example.app", true)).unwrap();

        let found = registry
            .lookup(&ApplicationId::from_static("com.example.app"))
            .unwrap();
        assert!(found.is_installed);
    }

    #[test]
    fn lookup_missing_is_not_found() {
        let registry = ApplicationRegistry::in_memory();
        let err = registry
            .lookup(&ApplicationId::from_static("com.nonexistent"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn duplicate_installed_record_rejected() {
        let (_dir, registry) = temp_registry();
        registry.insert(record("com.a", true)).unwrap();

        let mut second = record("com.a", true);
        second.bundle_version = Some("2".into());
        let err = registry.insert(second).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateIdentifier(_)));

        let kept = registry.lookup(&ApplicationId::from_static("com.a")).unwrap();
        assert_eq!(kept.bundle_version.as_deref(), Some("1"));
    }

    #[test]
    fn insert_replaces_placeholder_in_place() {
        let registry = ApplicationRegistry::in_memory();
        registry.insert(record("com.a", false)).unwrap();
        registry.insert(record("com.b", true)).unwrap();
        registry.insert(record("com.a", true)).unwrap();

        let all = registry.enumerate(ApplicationFilter::Any, true).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].application_identifier.as_str(), "com.a");
        assert!(all[0].is_installed);
    }

    #[test]
    fn replace_overwrites_installed_record() {
        let registry = ApplicationRegistry::in_memory();
        registry.insert(record("com.a", true)).unwrap();

        let mut updated = record("com.a", true);
        updated.bundle_version = Some("2".into());
        let previous = registry.write().unwrap().replace(updated).unwrap();

        assert_eq!(previous.unwrap().bundle_version.as_deref(), Some("1"));
        let current = registry.lookup(&ApplicationId::from_static("com.a")).unwrap();
        assert_eq!(current.bundle_version.as_deref(), Some("2"));
    }

    #[test]
    fn remove_missing_is_not_found() {
        let (_dir, registry) = temp_registry();
        registry.insert(record("com.a", true)).unwrap();

        let err = registry
            .remove(&ApplicationId::from_static("com.nonexistent"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
        assert_eq!(registry.read().unwrap().len(), 1);
    }

    #[test]
    fn mutations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("applications.toml");

        {
            let registry = ApplicationRegistry::open(&path).unwrap();
            registry.insert(record("com.a", true)).unwrap();
            registry.insert(record("com.b", true)).unwrap();
            registry.remove(&ApplicationId::from_static("com.a")).unwrap();
        }

        let reopened = ApplicationRegistry::open(&path).unwrap();
        let all = reopened.enumerate(ApplicationFilter::Any, true).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].application_identifier.as_str(), "com.b");
    }

    #[test]
    fn enumerate_hides_uninstalled_by_default() {
        let registry = ApplicationRegistry::in_memory();
        registry.insert(record("com.pending", false)).unwrap();
        registry.insert(record("com.ready", true)).unwrap();

        let installed = registry.enumerate(ApplicationFilter::Any, false).unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].application_identifier.as_str(), "com.ready");
    }

    #[test]
    fn failed_persist_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let registry_dir = dir.path().join("registry");
        let path = registry_dir.join("applications.toml");
        let registry = ApplicationRegistry::open(&path).unwrap();
        registry.insert(record("com.a", true)).unwrap();

        // Make the registry directory unusable for the next write.
        std::fs::remove_dir_all(&registry_dir).unwrap();
        std::fs::write(&registry_dir, b"not a directory").unwrap();

        let err = registry.insert(record("com.b", true)).unwrap_err();
        assert!(matches!(err, RegistryError::IndexError { .. }));

        let all = registry.enumerate(ApplicationFilter::Any, true).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].application_identifier.as_str(), "com.a");
    }

    #[test]
    fn reload_picks_up_external_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("applications.toml");
        let registry = ApplicationRegistry::open(&path).unwrap();

        let other = ApplicationRegistry::open(&path).unwrap();
        other.insert(record("com.external", true)).unwrap();

        assert!(registry.read().unwrap().is_empty());
        registry.reload().unwrap();
        assert_eq!(registry.read().unwrap().len(), 1);
    }

    #[test]
    fn write_guard_serializes_writers() {
        let registry = Arc::new(ApplicationRegistry::in_memory());

        std::thread::scope(|s| {
            for i in 0..8 {
                let registry = Arc::clone(&registry);
                s.spawn(move || {
                    let id = format!("com.example.app{i}");
                    let mut guard = registry.write().unwrap();
                    let before = guard.len();
                    guard.insert(record(&id, true)).unwrap();
                    assert_eq!(guard.len(), before.saturating_add(1));
                });
            }
        });

        assert_eq!(registry.read().unwrap().len(), 8);
    }
}
