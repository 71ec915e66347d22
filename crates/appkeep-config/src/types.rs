//! Configuration types for the appkeep registry.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filesystem locations.
    pub paths: PathsSection,
    /// Install, uninstall, and trust policy.
    pub install: InstallSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// PathsSection
// ---------------------------------------------------------------------------

/// Filesystem locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Override for the appkeep home directory. When unset the home is
    /// `$APPKEEP_HOME` or `~/.appkeep`.
    pub home: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// InstallSection
// ---------------------------------------------------------------------------

/// Install and uninstall policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallSection {
    /// Application types that may never be uninstalled (`"System"`,
    /// `"User"`, `"AppClip"`).
    pub protected_types: Vec<String>,
    /// Individual application identifiers that may never be uninstalled.
    pub protected_identifiers: Vec<String>,
    /// Treat installed, launch-prohibited applications as protected.
    pub protect_launch_prohibited: bool,
    /// Refuse to install bundles for which the trust subsystem reports no
    /// signer identity.
    pub require_signer: bool,
}

impl Default for InstallSection {
    fn default() -> Self {
        Self {
            protected_types: vec!["System".to_owned()],
            protected_identifiers: Vec::new(),
            protect_launch_prohibited: true,
            require_signer: true,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["appkeep_registry=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
