//! Bundle inspection.
//!
//! Reads a bundle directory and produces a candidate [`ApplicationRecord`].
//! Inspection never writes to disk. Location fields on the returned record
//! point at the source bundle until the orchestrator stages it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use appkeep_core::{
    ApplicationId, ApplicationRecord, ApplicationType, is_bundle_relative, metadata_from_toml,
};

use crate::error::{InspectError, InspectResult, SigningError};
use crate::manifest::BundleManifest;
use crate::trust::{SigningReport, TrustSubsystem};

/// Produces application records from bundles on disk.
#[derive(Clone)]
pub struct BundleInspector {
    trust: Arc<dyn TrustSubsystem>,
    require_signer: bool,
}

impl std::fmt::Debug for BundleInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleInspector")
            .field("require_signer", &self.require_signer)
            .finish_non_exhaustive()
    }
}

impl BundleInspector {
    /// Create an inspector that consults `trust` and requires a signer.
    #[must_use]
    pub fn new(trust: Arc<dyn TrustSubsystem>) -> Self {
        Self {
            trust,
            require_signer: true,
        }
    }

    /// Whether a report with no signer identity fails inspection.
    #[must_use]
    pub fn with_require_signer(mut self, require_signer: bool) -> Self {
        self.require_signer = require_signer;
        self
    }

    /// Inspect a bundle for a full install.
    ///
    /// # Errors
    ///
    /// - [`InspectError::MalformedBundle`] if the manifest is missing or invalid
    /// - [`InspectError::MissingExecutable`] if the declared executable is absent
    /// - [`InspectError::Signing`] if the trust subsystem fails
    pub fn inspect(&self, bundle_path: &Path) -> InspectResult<ApplicationRecord> {
        self.inspect_bundle(bundle_path, false)
    }

    /// Inspect a bundle for a placeholder registration: the executable need
    /// not be present and a missing signature is tolerated.
    ///
    /// # Errors
    ///
    /// Same as [`Self::inspect`], minus the executable and
    /// signature-availability checks.
    pub fn inspect_placeholder(&self, bundle_path: &Path) -> InspectResult<ApplicationRecord> {
        self.inspect_bundle(bundle_path, true)
    }

    fn inspect_bundle(
        &self,
        bundle_path: &Path,
        placeholder: bool,
    ) -> InspectResult<ApplicationRecord> {
        let malformed = |reason: String| InspectError::MalformedBundle {
            path: bundle_path.to_path_buf(),
            reason,
        };

        if !bundle_path.is_dir() {
            return Err(malformed("bundle is not a directory".into()));
        }

        let manifest = BundleManifest::load(bundle_path)?;

        let item_name = bundle_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| malformed("bundle path has no file name".into()))?;

        let application_identifier = ApplicationId::new(
            manifest
                .application_identifier
                .clone()
                .unwrap_or_else(|| manifest.identifier.clone()),
        )
        .map_err(|e| malformed(e.to_string()))?;

        let application_type = match &manifest.application_type {
            Some(name) => name
                .parse::<ApplicationType>()
                .map_err(|e| malformed(e.to_string()))?,
            None => ApplicationType::default(),
        };

        if let Some(executable) = &manifest.executable {
            if !is_bundle_relative(executable) {
                return Err(malformed(format!(
                    "executable '{executable}' must be a relative path inside the bundle"
                )));
            }
            if !placeholder && !bundle_path.join(executable).is_file() {
                return Err(InspectError::MissingExecutable {
                    path: bundle_path.to_path_buf(),
                    executable: executable.clone(),
                });
            }
        } else if !placeholder {
            return Err(malformed("manifest declares no executable".into()));
        }

        let report = self.signing_report(bundle_path, placeholder)?;

        debug!(
            app_id = %application_identifier,
            path = %bundle_path.display(),
            placeholder,
            signer = report.signer_identity.as_deref().unwrap_or("<none>"),
            "Inspected bundle"
        );

        Ok(ApplicationRecord {
            application_identifier,
            bundle_identifier: manifest.identifier,
            bundle_url: bundle_path.to_path_buf(),
            container_url: PathBuf::new(),
            bundle_executable: manifest.executable,
            bundle_version: manifest.version,
            short_version_string: manifest.short_version,
            localized_name: manifest.display_name,
            localized_short_name: manifest.short_name,
            item_name,
            application_type,
            signer_identity: report.signer_identity,
            team_id: report.team_id,
            is_installed: !placeholder,
            is_placeholder: placeholder,
            is_app_clip: application_type == ApplicationType::AppClip,
            is_launch_prohibited: placeholder || manifest.launch_prohibited,
            registered_at: Utc::now(),
            entitlements: report.entitlements,
            info_plist: metadata_from_toml(manifest.raw),
        })
    }

    fn signing_report(
        &self,
        bundle_path: &Path,
        placeholder: bool,
    ) -> InspectResult<SigningReport> {
        let verified = if placeholder {
            self.trust.verify_placeholder(bundle_path)
        } else {
            self.trust.verify(bundle_path)
        };
        match verified {
            Ok(report)
                if report.signer_identity.is_none() && self.require_signer && !placeholder =>
            {
                Err(SigningError::Unavailable {
                    path: bundle_path.to_path_buf(),
                }
                .into())
            },
            Ok(report) => Ok(report),
            Err(SigningError::Unavailable { .. }) if placeholder => Ok(SigningReport::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::EmbeddedSignatureVerifier;

    struct FixedTrust(Result<SigningReport, fn(&Path) -> SigningError>);

    impl TrustSubsystem for FixedTrust {
        fn verify(&self, bundle_path: &Path) -> Result<SigningReport, SigningError> {
            match &self.0 {
                Ok(report) => Ok(report.clone()),
                Err(make) => Err(make(bundle_path)),
            }
        }
    }

    fn signed() -> BundleInspector {
        BundleInspector::new(Arc::new(FixedTrust(Ok(SigningReport {
            signer_identity: Some("Example Corp".into()),
            team_id: Some("TEAM1".into()),
            entitlements: appkeep_core::Metadata::new(),
        }))))
    }

    fn unavailable() -> BundleInspector {
        BundleInspector::new(Arc::new(FixedTrust(Err(|p| SigningError::Unavailable {
            path: p.to_path_buf(),
        }))))
    }

    fn write_bundle(root: &Path, manifest: &str, with_executable: bool) -> PathBuf {
        let bundle = root.join("Example.app");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("Info.toml"), manifest).unwrap();
        if with_executable {
            std::fs::write(bundle.join("Example"), b"#!/bin/sh\n").unwrap();
        }
        bundle
    }

    const MANIFEST: &str = r#"
identifier = "com.example.app"
executable = "Example"
version = "7"
short_version = "1.0"
display_name = "Example"
minimum_os_version = "15.0"
"#;

    #[test]
    fn inspect_builds_record() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path(), MANIFEST, true);

        let record = signed().inspect(&bundle).unwrap();
        assert_eq!(record.application_identifier.as_str(), "com.example.app");
        assert_eq!(record.bundle_identifier, "com.example.app");
        assert_eq!(record.item_name, "Example.app");
        assert_eq!(record.bundle_version.as_deref(), Some("7"));
        assert_eq!(record.signer_identity.as_deref(), Some("Example Corp"));
        assert_eq!(record.application_type, ApplicationType::User);
        assert!(record.is_installed);
        assert!(!record.is_placeholder);
        assert!(!record.is_launch_prohibited);
        assert_eq!(record.info_string("minimum_os_version"), Some("15.0"));
    }

    #[test]
    fn application_identifier_override() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = format!("{MANIFEST}application_identifier = \"TEAM1.com.example.app\"\n");
        let bundle = write_bundle(dir.path(), &manifest, true);

        let record = signed().inspect(&bundle).unwrap();
        assert_eq!(record.application_identifier.as_str(), "TEAM1.com.example.app");
        assert_eq!(record.bundle_identifier, "com.example.app");
    }

    #[test]
    fn app_clip_type_sets_flag() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = format!("{MANIFEST}application_type = \"AppClip\"\n");
        let bundle = write_bundle(dir.path(), &manifest, true);

        let record = signed().inspect(&bundle).unwrap();
        assert!(record.is_app_clip);
        assert_eq!(record.application_type, ApplicationType::AppClip);
    }

    #[test]
    fn missing_manifest_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let err = signed().inspect(dir.path()).unwrap_err();
        assert!(matches!(err, InspectError::MalformedBundle { .. }));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = format!("{MANIFEST}application_type = \"Daemon\"\n");
        let bundle = write_bundle(dir.path(), &manifest, true);
        assert!(matches!(
            signed().inspect(&bundle),
            Err(InspectError::MalformedBundle { .. })
        ));
    }

    #[test]
    fn escaping_executable_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(
            dir.path(),
            "identifier = \"com.example.app\"\nexecutable = \"../outside\"\n",
            false,
        );
        assert!(matches!(
            signed().inspect(&bundle),
            Err(InspectError::MalformedBundle { .. })
        ));
    }

    #[test]
    fn absent_executable_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path(), MANIFEST, false);
        assert!(matches!(
            signed().inspect(&bundle),
            Err(InspectError::MissingExecutable { .. })
        ));
    }

    #[test]
    fn placeholder_tolerates_missing_executable_and_signature() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path(), MANIFEST, false);

        let record = unavailable().inspect_placeholder(&bundle).unwrap();
        assert!(!record.is_installed);
        assert!(record.is_placeholder);
        assert!(record.is_launch_prohibited);
        assert!(record.signer_identity.is_none());
    }

    #[test]
    fn signing_unavailable_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path(), MANIFEST, true);
        assert!(matches!(
            unavailable().inspect(&bundle),
            Err(InspectError::Signing(SigningError::Unavailable { .. }))
        ));
    }

    #[test]
    fn unsigned_report_rejected_when_signer_required() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path(), MANIFEST, true);
        let inspector = BundleInspector::new(Arc::new(FixedTrust(Ok(SigningReport::default()))));

        assert!(inspector.inspect(&bundle).is_err());
        assert!(
            inspector
                .with_require_signer(false)
                .inspect(&bundle)
                .is_ok()
        );
    }

    #[test]
    fn embedded_verifier_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path(), MANIFEST, true);
        let sig_dir = bundle.join(crate::trust::SIGNATURE_DIR);
        std::fs::create_dir_all(&sig_dir).unwrap();
        let hash = EmbeddedSignatureVerifier::hash_bytes(b"#!/bin/sh\n");
        std::fs::write(
            sig_dir.join(crate::trust::SIGNATURE_FILE),
            format!(
                "signer = \"Example Corp\"\nexecutable_hash = \"{hash}\"\n\
                 [entitlements]\nget-task-allow = true\n"
            ),
        )
        .unwrap();

        let inspector = BundleInspector::new(Arc::new(EmbeddedSignatureVerifier::new()));
        let record = inspector.inspect(&bundle).unwrap();
        assert!(record.has_entitlement("get-task-allow"));
    }

    #[test]
    fn signed_placeholder_registers_before_executable_arrives() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path(), MANIFEST, false);
        let sig_dir = bundle.join(crate::trust::SIGNATURE_DIR);
        std::fs::create_dir_all(&sig_dir).unwrap();
        let hash = EmbeddedSignatureVerifier::hash_bytes(b"#!/bin/sh\n");
        std::fs::write(
            sig_dir.join(crate::trust::SIGNATURE_FILE),
            format!("signer = \"Example Corp\"\nexecutable_hash = \"{hash}\"\n"),
        )
        .unwrap();
        let inspector = BundleInspector::new(Arc::new(EmbeddedSignatureVerifier::new()));

        let record = inspector.inspect_placeholder(&bundle).unwrap();
        assert!(record.is_placeholder);
        assert_eq!(record.signer_identity.as_deref(), Some("Example Corp"));
        assert!(matches!(
            inspector.inspect(&bundle),
            Err(InspectError::MissingExecutable { .. })
        ));
    }
}
