//! Application records.
//!
//! An [`ApplicationRecord`] is the registry's view of one application:
//! identity, on-disk location, versioning, presentation strings, trust
//! metadata, and the state flags that gate install/uninstall/launch. Records
//! are produced by bundle inspection and owned by the registry; everything
//! handed to callers is a clone.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::ApplicationId;
use crate::metadata::{Metadata, MetadataValue};

/// The class of an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationType {
    /// Shipped with the operating system.
    System,
    /// Installed by the user.
    #[default]
    User,
    /// Lightweight, partially installed user application.
    AppClip,
}

impl ApplicationType {
    /// Canonical name as written in manifests and config files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::AppClip => "AppClip",
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "System" | "system" => Ok(Self::System),
            "User" | "user" => Ok(Self::User),
            "AppClip" | "appclip" | "app-clip" => Ok(Self::AppClip),
            other => Err(CoreError::UnknownApplicationType(other.to_string())),
        }
    }
}

/// Which application types an enumeration should return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplicationFilter {
    /// Every type.
    #[default]
    Any,
    /// User-installed applications, App Clips included.
    UserOnly,
    /// System applications only.
    SystemOnly,
}

impl ApplicationFilter {
    /// Whether a record of the given type passes this filter.
    #[must_use]
    pub fn matches(self, application_type: ApplicationType) -> bool {
        match self {
            Self::Any => true,
            Self::UserOnly => matches!(
                application_type,
                ApplicationType::User | ApplicationType::AppClip
            ),
            Self::SystemOnly => application_type == ApplicationType::System,
        }
    }
}

impl From<ApplicationType> for ApplicationFilter {
    fn from(application_type: ApplicationType) -> Self {
        match application_type {
            ApplicationType::System => Self::SystemOnly,
            ApplicationType::User | ApplicationType::AppClip => Self::UserOnly,
        }
    }
}

/// Snapshot of one application's identity and metadata.
///
/// `entitlements` and `info_plist` are captured when the record is built
/// and never track later edits to the bundle on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Registry key. Assigned at registration and never reused for another
    /// bundle while a record with this identifier exists.
    pub application_identifier: ApplicationId,
    /// Bundle identifier declared by the manifest. Not globally unique.
    pub bundle_identifier: String,
    /// Location of the application bundle.
    pub bundle_url: PathBuf,
    /// Location of the application's writable data container.
    pub container_url: PathBuf,
    /// Executable file name, relative to `bundle_url`.
    pub bundle_executable: Option<String>,
    /// Build version string (opaque).
    pub bundle_version: Option<String>,
    /// Marketing version string (opaque).
    pub short_version_string: Option<String>,
    /// Display name.
    pub localized_name: Option<String>,
    /// Short display name.
    pub localized_short_name: Option<String>,
    /// File name of the bundle directory.
    pub item_name: String,
    /// Application class.
    pub application_type: ApplicationType,
    /// Code-signing identity reported by the trust subsystem.
    pub signer_identity: Option<String>,
    /// Team identifier reported by the trust subsystem.
    pub team_id: Option<String>,
    /// Whether the bundle is fully installed.
    pub is_installed: bool,
    /// Whether this record stands in for an application not yet installed.
    pub is_placeholder: bool,
    /// Whether this is an App Clip.
    pub is_app_clip: bool,
    /// Whether launching is disallowed.
    pub is_launch_prohibited: bool,
    /// When the record was built.
    pub registered_at: DateTime<Utc>,
    /// Entitlements snapshot (key → value).
    #[serde(default)]
    pub entitlements: Metadata,
    /// Manifest snapshot (key → value).
    #[serde(default)]
    pub info_plist: Metadata,
}

impl ApplicationRecord {
    /// Path to the executable, if the record declares one.
    #[must_use]
    pub fn executable_path(&self) -> Option<PathBuf> {
        self.bundle_executable
            .as_deref()
            .map(|exe| self.bundle_url.join(exe))
    }

    /// Look up a single entitlement.
    #[must_use]
    pub fn entitlement(&self, key: &str) -> Option<&MetadataValue> {
        self.entitlements.get(key)
    }

    /// Whether the named entitlement is present and truthy.
    #[must_use]
    pub fn has_entitlement(&self, key: &str) -> bool {
        self.entitlement(key).is_some_and(MetadataValue::is_truthy)
    }

    /// Look up a single manifest key as a string.
    #[must_use]
    pub fn info_string(&self, key: &str) -> Option<&str> {
        self.info_plist.get(key).and_then(MetadataValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ApplicationRecord {
        let mut entitlements = Metadata::new();
        entitlements.insert("get-task-allow".into(), MetadataValue::Bool(true));
        entitlements.insert("platform-application".into(), MetadataValue::Bool(false));
        let mut info_plist = Metadata::new();
        info_plist.insert("minimum_os_version".into(), "15.0".into());

        ApplicationRecord {
            application_identifier: ApplicationId::from_static("com.example.app"),
            bundle_identifier: "com.example.app".into(),
            bundle_url: PathBuf::from("/apps/1/Example.app"),
            container_url: PathBuf::from("/data/1"),
            bundle_executable: Some("Example".into()),
            bundle_version: Some("1".into()),
            short_version_string: Some("1.0".into()),
            localized_name: Some("Example".into()),
            localized_short_name: None,
            item_name: "Example.app".into(),
            application_type: ApplicationType::User,
            signer_identity: Some("Example Signer".into()),
            team_id: Some("TEAM123".into()),
            is_installed: true,
            is_placeholder: false,
            is_app_clip: false,
            is_launch_prohibited: false,
            registered_at: Utc::now(),
            entitlements,
            info_plist,
        }
    }

    #[test]
    fn filter_matching() {
        assert!(ApplicationFilter::Any.matches(ApplicationType::System));
        assert!(ApplicationFilter::UserOnly.matches(ApplicationType::AppClip));
        assert!(!ApplicationFilter::UserOnly.matches(ApplicationType::System));
        assert!(ApplicationFilter::SystemOnly.matches(ApplicationType::System));
        assert!(!ApplicationFilter::SystemOnly.matches(ApplicationType::User));
    }

    #[test]
    fn application_type_parse() {
        assert_eq!(
            "System".parse::<ApplicationType>().unwrap(),
            ApplicationType::System
        );
        assert_eq!(
            "app-clip".parse::<ApplicationType>().unwrap(),
            ApplicationType::AppClip
        );
        assert!("Daemon".parse::<ApplicationType>().is_err());
    }

    #[test]
    fn executable_path_joins_bundle() {
        let record = sample();
        assert_eq!(
            record.executable_path(),
            Some(PathBuf::from("/apps/1/Example.app/Example"))
        );
    }

    #[test]
    fn entitlement_lookup() {
        let record = sample();
        assert!(record.has_entitlement("get-task-allow"));
        assert!(!record.has_entitlement("platform-application"));
        assert!(!record.has_entitlement("missing"));
        assert_eq!(record.info_string("minimum_os_version"), Some("15.0"));
    }

    #[test]
    fn toml_roundtrip_keeps_snapshots() {
        let record = sample();
        let text = toml::to_string(&record).unwrap();
        let back: ApplicationRecord = toml::from_str(&text).unwrap();
        assert_eq!(back, record);
    }
}
