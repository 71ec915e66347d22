//! Bundle fixtures written to disk.

use std::path::{Path, PathBuf};

use appkeep_core::ApplicationType;
use appkeep_install::trust::{SIGNATURE_DIR, SIGNATURE_FILE};
use appkeep_install::{EmbeddedSignatureVerifier, MANIFEST_FILE_NAME};

/// Contents written as the fixture executable.
const EXECUTABLE_BODY: &[u8] = b"#!/bin/sh\nexit 0\n";

/// Builder for an application bundle directory.
#[derive(Debug, Clone)]
pub struct BundleFixture {
    identifier: String,
    item_name: String,
    executable: Option<String>,
    write_executable: bool,
    version: String,
    short_version: String,
    display_name: Option<String>,
    application_identifier: Option<String>,
    application_type: ApplicationType,
    launch_prohibited: bool,
    extra: toml::Table,
    signer: Option<String>,
    entitlements: toml::Table,
}

impl BundleFixture {
    /// A user application named `Example.app` with executable `Example`.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            item_name: "Example.app".to_string(),
            executable: Some("Example".to_string()),
            write_executable: true,
            version: "1".to_string(),
            short_version: "1.0".to_string(),
            display_name: Some("Example".to_string()),
            application_identifier: None,
            application_type: ApplicationType::User,
            launch_prohibited: false,
            extra: toml::Table::new(),
            signer: None,
            entitlements: toml::Table::new(),
        }
    }

    /// Bundle directory name.
    #[must_use]
    pub fn item_name(mut self, name: impl Into<String>) -> Self {
        self.item_name = name.into();
        self
    }

    /// Build version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Marketing version.
    #[must_use]
    pub fn short_version(mut self, version: impl Into<String>) -> Self {
        self.short_version = version.into();
        self
    }

    /// Display name.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Registry key distinct from the bundle identifier.
    #[must_use]
    pub fn application_identifier(mut self, id: impl Into<String>) -> Self {
        self.application_identifier = Some(id.into());
        self
    }

    /// Application type.
    #[must_use]
    pub fn application_type(mut self, ty: ApplicationType) -> Self {
        self.application_type = ty;
        self
    }

    /// Mark the bundle launch-prohibited.
    #[must_use]
    pub fn launch_prohibited(mut self) -> Self {
        self.launch_prohibited = true;
        self
    }

    /// Declare the executable but do not write it.
    #[must_use]
    pub fn without_executable_file(mut self) -> Self {
        self.write_executable = false;
        self
    }

    /// Declare no executable at all.
    #[must_use]
    pub fn without_executable(mut self) -> Self {
        self.executable = None;
        self.write_executable = false;
        self
    }

    /// Add an arbitrary manifest key.
    #[must_use]
    pub fn manifest_key(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Embed a signature report signed by `signer`, covering the executable.
    #[must_use]
    pub fn signed_by(mut self, signer: impl Into<String>) -> Self {
        self.signer = Some(signer.into());
        self
    }

    /// Add an entitlement to the embedded signature report.
    #[must_use]
    pub fn entitlement(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.entitlements.insert(key.into(), value.into());
        self
    }

    /// Render the manifest.
    #[must_use]
    pub fn manifest(&self) -> String {
        let mut table = toml::Table::new();
        table.insert("identifier".into(), self.identifier.clone().into());
        if let Some(exe) = &self.executable {
            table.insert("executable".into(), exe.clone().into());
        }
        table.insert("version".into(), self.version.clone().into());
        table.insert("short_version".into(), self.short_version.clone().into());
        if let Some(name) = &self.display_name {
            table.insert("display_name".into(), name.clone().into());
        }
        if let Some(id) = &self.application_identifier {
            table.insert("application_identifier".into(), id.clone().into());
        }
        table.insert(
            "application_type".into(),
            self.application_type.as_str().into(),
        );
        table.insert("launch_prohibited".into(), self.launch_prohibited.into());
        for (k, v) in &self.extra {
            table.insert(k.clone(), v.clone());
        }
        toml::to_string(&table).unwrap_or_default()
    }

    /// Write the bundle under `parent` and return its path.
    ///
    /// # Panics
    ///
    /// Panics if the bundle cannot be written.
    #[must_use]
    pub fn write_to(&self, parent: &Path) -> PathBuf {
        let bundle = parent.join(&self.item_name);
        std::fs::create_dir_all(&bundle).expect("create bundle dir");
        std::fs::write(bundle.join(MANIFEST_FILE_NAME), self.manifest()).expect("write manifest");

        if self.write_executable
            && let Some(exe) = &self.executable
        {
            std::fs::write(bundle.join(exe), EXECUTABLE_BODY).expect("write executable");
        }

        if let Some(signer) = &self.signer {
            let mut report = toml::Table::new();
            report.insert("signer".into(), signer.clone().into());
            report.insert("team_id".into(), "FIXTURE".into());
            if self.executable.is_some() {
                report.insert(
                    "executable_hash".into(),
                    EmbeddedSignatureVerifier::hash_bytes(EXECUTABLE_BODY).into(),
                );
            }
            report.insert(
                "entitlements".into(),
                toml::Value::Table(self.entitlements.clone()),
            );
            let sig_dir = bundle.join(SIGNATURE_DIR);
            std::fs::create_dir_all(&sig_dir).expect("create signature dir");
            std::fs::write(
                sig_dir.join(SIGNATURE_FILE),
                toml::to_string(&report).unwrap_or_default(),
            )
            .expect("write signature");
        }

        bundle
    }
}
