//! Presentation summary derived from a record.

use std::path::PathBuf;

use serde::Serialize;

use crate::dirs::is_bundle_relative;
use crate::metadata::MetadataValue;
use crate::record::{ApplicationRecord, ApplicationType};

/// Manifest key holding the minimum OS version.
pub const MINIMUM_OS_VERSION_KEY: &str = "minimum_os_version";
/// Manifest key holding the SDK version the bundle was built against.
pub const SDK_VERSION_KEY: &str = "sdk_version";
/// Manifest table holding icon declarations.
pub const ICONS_KEY: &str = "icons";

/// Suffixes tried when resolving a declared icon name to a file.
const ICON_SUFFIXES: [&str; 4] = ["", ".png", "@2x.png", "@3x.png"];

/// Flattened, display-oriented view of an [`ApplicationRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppSummary {
    /// Application identifier.
    pub identifier: String,
    /// Bundle identifier.
    pub bundle_identifier: String,
    /// Display name, falling back to the bundle's item name.
    pub display_name: String,
    /// Executable name.
    pub executable_name: Option<String>,
    /// Build version.
    pub bundle_version: Option<String>,
    /// Marketing version.
    pub short_version_string: Option<String>,
    /// Application type.
    pub application_type: ApplicationType,
    /// Bundle location.
    pub bundle_path: PathBuf,
    /// Data container location.
    pub container_path: PathBuf,
    /// Code-signing identity.
    pub signer_identity: Option<String>,
    /// Whether this is an App Clip.
    pub is_app_clip: bool,
    /// Whether the application may be updated in place.
    pub is_upgradeable: bool,
    /// Minimum OS version declared by the manifest.
    pub minimum_os_version: Option<String>,
    /// SDK version declared by the manifest.
    pub sdk_version: Option<String>,
    /// Candidate icon files, most specific declaration first.
    pub icon_candidates: Vec<PathBuf>,
}

impl From<&ApplicationRecord> for AppSummary {
    fn from(record: &ApplicationRecord) -> Self {
        Self {
            identifier: record.application_identifier.to_string(),
            bundle_identifier: record.bundle_identifier.clone(),
            display_name: record
                .localized_name
                .clone()
                .unwrap_or_else(|| record.item_name.clone()),
            executable_name: record.bundle_executable.clone(),
            bundle_version: record.bundle_version.clone(),
            short_version_string: record.short_version_string.clone(),
            application_type: record.application_type,
            bundle_path: record.bundle_url.clone(),
            container_path: record.container_url.clone(),
            signer_identity: record.signer_identity.clone(),
            is_app_clip: record.is_app_clip,
            is_upgradeable: !record.is_launch_prohibited,
            minimum_os_version: record.info_string(MINIMUM_OS_VERSION_KEY).map(str::to_string),
            sdk_version: record.info_string(SDK_VERSION_KEY).map(str::to_string),
            icon_candidates: icon_candidates(record),
        }
    }
}

/// Declared icon names from the manifest snapshot, in declaration order.
#[must_use]
pub fn declared_icon_names(record: &ApplicationRecord) -> Vec<String> {
    let Some(icons) = record.info_plist.get(ICONS_KEY) else {
        return Vec::new();
    };
    let mut names: Vec<String> = icons
        .get("files")
        .and_then(MetadataValue::as_array)
        .unwrap_or_default()
        .iter()
        .filter_map(MetadataValue::as_str)
        .map(str::to_string)
        .collect();
    if let Some(primary) = icons.get("file").and_then(MetadataValue::as_str) {
        names.push(primary.to_string());
    }
    names
}

/// Expand declared icon names into candidate file paths inside the bundle.
///
/// Only paths are produced; whether they exist is left to the caller. Names
/// that would resolve outside the bundle are skipped.
#[must_use]
pub fn icon_candidates(record: &ApplicationRecord) -> Vec<PathBuf> {
    declared_icon_names(record)
        .iter()
        .filter(|name| is_bundle_relative(name))
        .flat_map(|name| {
            ICON_SUFFIXES
                .iter()
                .map(move |suffix| record.bundle_url.join(format!("{name}{suffix}")))
        })
        .collect()
}
