//! Trust subsystem boundary.
//!
//! The registry never establishes trust itself. It asks a
//! [`TrustSubsystem`] what signer and entitlements a bundle carries and
//! records the answer.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use appkeep_core::{Metadata, metadata_from_toml};

use crate::error::{SigningError, SigningResult};
use crate::manifest::BundleManifest;

/// Directory holding the embedded signature report.
pub const SIGNATURE_DIR: &str = "_CodeSignature";
/// Signature report file name inside [`SIGNATURE_DIR`].
pub const SIGNATURE_FILE: &str = "Signature.toml";

/// What the trust subsystem reports about a bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SigningReport {
    /// Signing identity, if any.
    pub signer_identity: Option<String>,
    /// Team identifier, if any.
    pub team_id: Option<String>,
    /// Entitlements embedded in the signature.
    pub entitlements: Metadata,
}

/// Validates bundle signatures.
pub trait TrustSubsystem: Send + Sync {
    /// Verify the bundle at `bundle_path` and report its signer.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Unavailable`] when no signer can be reported
    /// and [`SigningError::Rejected`] when the signature is invalid.
    fn verify(&self, bundle_path: &Path) -> SigningResult<SigningReport>;

    /// Verify a bundle registered as a placeholder, whose executable may not
    /// have arrived yet. Content checks that need the executable are skipped
    /// while it is absent; everything else is checked as in [`Self::verify`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::verify`].
    fn verify_placeholder(&self, bundle_path: &Path) -> SigningResult<SigningReport> {
        self.verify(bundle_path)
    }
}

#[derive(Debug, Deserialize)]
struct SignatureFile {
    signer: String,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    executable_hash: Option<String>,
    #[serde(default)]
    entitlements: toml::Table,
}

/// Reads the signature report embedded at
/// `<bundle>/_CodeSignature/Signature.toml` and checks the executable hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSignatureVerifier;

impl EmbeddedSignatureVerifier {
    /// Create a verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Format a hash the way signature reports record it.
    #[must_use]
    pub fn hash_bytes(data: &[u8]) -> String {
        format!("blake3:{}", blake3::hash(data).to_hex())
    }
}

impl EmbeddedSignatureVerifier {
    fn check(bundle_path: &Path, placeholder: bool) -> SigningResult<SigningReport> {
        let report_path = bundle_path.join(SIGNATURE_DIR).join(SIGNATURE_FILE);
        let rejected = |reason: String| SigningError::Rejected {
            path: bundle_path.to_path_buf(),
            reason,
        };

        let content = match std::fs::read_to_string(&report_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SigningError::Unavailable {
                    path: bundle_path.to_path_buf(),
                });
            },
            Err(e) => return Err(rejected(format!("cannot read signature report: {e}"))),
        };

        let report: SignatureFile = toml::from_str(&content)
            .map_err(|e| rejected(format!("unparseable signature report: {e}")))?;

        if let Some(expected) = &report.executable_hash {
            let manifest = BundleManifest::load(bundle_path)
                .map_err(|e| rejected(format!("cannot resolve signed executable: {e}")))?;
            let executable = manifest.executable.ok_or_else(|| {
                rejected("signature covers an executable the manifest does not declare".into())
            })?;
            let executable_path = bundle_path.join(&executable);
            if placeholder && !executable_path.exists() {
                debug!(
                    path = %bundle_path.display(),
                    executable = %executable,
                    "Executable not yet present; hash check deferred"
                );
            } else {
                let bytes = std::fs::read(&executable_path)
                    .map_err(|e| rejected(format!("cannot read executable '{executable}': {e}")))?;
                let actual = Self::hash_bytes(&bytes);
                if actual != *expected {
                    return Err(rejected(format!(
                        "executable hash mismatch: expected {expected}, got {actual}"
                    )));
                }
                debug!(path = %bundle_path.display(), "Executable hash verified");
            }
        }

        Ok(SigningReport {
            signer_identity: Some(report.signer),
            team_id: report.team_id,
            entitlements: metadata_from_toml(report.entitlements),
        })
    }
}

impl TrustSubsystem for EmbeddedSignatureVerifier {
    fn verify(&self, bundle_path: &Path) -> SigningResult<SigningReport> {
        Self::check(bundle_path, false)
    }

    fn verify_placeholder(&self, bundle_path: &Path) -> SigningResult<SigningReport> {
        Self::check(bundle_path, true)
    }
}
