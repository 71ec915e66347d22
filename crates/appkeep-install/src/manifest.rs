//! Bundle manifest (`Info.toml`).

use std::path::Path;

use serde::Deserialize;

use crate::error::{InspectError, InspectResult};

/// Manifest file name at the bundle root.
pub const MANIFEST_FILE_NAME: &str = "Info.toml";

/// Maximum manifest size accepted (256 KB).
const MAX_MANIFEST_SIZE: u64 = 262_144;

/// Typed view of the manifest keys the registry understands.
///
/// Unknown keys are allowed; the full table is kept in [`Self::raw`].
#[derive(Debug, Clone, Deserialize)]
pub struct BundleManifest {
    /// Bundle identifier.
    pub identifier: String,
    /// Executable file name, relative to the bundle root.
    #[serde(default)]
    pub executable: Option<String>,
    /// Build version.
    #[serde(default)]
    pub version: Option<String>,
    /// Marketing version.
    #[serde(default)]
    pub short_version: Option<String>,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Short display name.
    #[serde(default)]
    pub short_name: Option<String>,
    /// Registry key, when it differs from `identifier`.
    #[serde(default)]
    pub application_identifier: Option<String>,
    /// `System`, `User`, or `AppClip`.
    #[serde(default)]
    pub application_type: Option<String>,
    /// Whether launching is disallowed.
    #[serde(default)]
    pub launch_prohibited: bool,
    /// The manifest exactly as parsed.
    #[serde(skip)]
    pub raw: toml::Table,
}

impl BundleManifest {
    /// Read and parse `<bundle>/Info.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::MalformedBundle`] if the file is missing,
    /// oversized, or does not parse.
    pub fn load(bundle_path: &Path) -> InspectResult<Self> {
        let manifest_path = bundle_path.join(MANIFEST_FILE_NAME);
        let malformed = |reason: String| InspectError::MalformedBundle {
            path: bundle_path.to_path_buf(),
            reason,
        };

        let metadata = std::fs::metadata(&manifest_path)
            .map_err(|e| malformed(format!("cannot read {MANIFEST_FILE_NAME}: {e}")))?;
        if metadata.len() > MAX_MANIFEST_SIZE {
            return Err(malformed(format!(
                "{MANIFEST_FILE_NAME} is {} bytes, exceeding the {MAX_MANIFEST_SIZE} byte limit",
                metadata.len()
            )));
        }

        let content = std::fs::read_to_string(&manifest_path)
            .map_err(|e| malformed(format!("cannot read {MANIFEST_FILE_NAME}: {e}")))?;
        Self::parse(&content).map_err(malformed)
    }

    /// Parse manifest text.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the text is not valid TOML
    /// or lacks a non-empty `identifier`.
    pub fn parse(content: &str) -> Result<Self, String> {
        let raw: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
        let mut manifest: Self = raw
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| e.to_string())?;
        if manifest.identifier.trim().is_empty() {
            return Err("identifier must not be empty".to_owned());
        }
        manifest.raw = raw;
        Ok(manifest)
    }
}
