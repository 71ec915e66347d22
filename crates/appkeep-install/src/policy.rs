//! Uninstall protection rules.

use std::collections::{BTreeSet, HashSet};

use appkeep_config::InstallSection;
use appkeep_core::{ApplicationRecord, ApplicationType, CoreResult};

/// Decides which applications may not be uninstalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionPolicy {
    protected_types: HashSet<ApplicationType>,
    protected_identifiers: BTreeSet<String>,
    protect_launch_prohibited: bool,
}

impl ProtectionPolicy {
    /// A policy that protects nothing.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            protected_types: HashSet::new(),
            protected_identifiers: BTreeSet::new(),
            protect_launch_prohibited: false,
        }
    }

    /// Build a policy from the `[install]` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if a protected type name is unknown.
    pub fn from_config(section: &InstallSection) -> CoreResult<Self> {
        let protected_types = section
            .protected_types
            .iter()
            .map(|name| name.parse::<ApplicationType>())
            .collect::<CoreResult<HashSet<_>>>()?;
        Ok(Self {
            protected_types,
            protected_identifiers: section.protected_identifiers.iter().cloned().collect(),
            protect_launch_prohibited: section.protect_launch_prohibited,
        })
    }

    /// Also protect the given identifier.
    #[must_use]
    pub fn with_protected_identifier(mut self, id: impl Into<String>) -> Self {
        self.protected_identifiers.insert(id.into());
        self
    }

    /// Also protect every application of the given type.
    #[must_use]
    pub fn with_protected_type(mut self, ty: ApplicationType) -> Self {
        self.protected_types.insert(ty);
        self
    }

    /// The reason `record` may not be uninstalled, or `None` if it may.
    #[must_use]
    pub fn protection_reason(&self, record: &ApplicationRecord) -> Option<String> {
        if self.protected_types.contains(&record.application_type) {
            return Some(format!(
                "{} applications cannot be uninstalled",
                record.application_type
            ));
        }
        if self
            .protected_identifiers
            .contains(record.application_identifier.as_str())
        {
            return Some("identifier is on the protected list".to_owned());
        }
        if self.protect_launch_prohibited && record.is_installed && record.is_launch_prohibited {
            return Some("installed launch-prohibited applications are protected".to_owned());
        }
        None
    }
}

impl Default for ProtectionPolicy {
    /// System applications and installed launch-prohibited applications are
    /// protected.
    fn default() -> Self {
        Self {
            protected_types: HashSet::from([ApplicationType::System]),
            protected_identifiers: BTreeSet::new(),
            protect_launch_prohibited: true,
        }
    }
}
