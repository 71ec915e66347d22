//! Shared test utilities for appkeep.
//!
//! Mock collaborators with failure switches, bundle fixtures that write
//! real bundles to disk, and a [`TestWorkspace`] that wires them together
//! under a temporary home.
//!
//! ```rust,ignore
//! use appkeep_install::InstallOptions;
//! use appkeep_test::{BundleFixture, TestWorkspace};
//!
//! let env = TestWorkspace::new();
//! let bundle = BundleFixture::new("com.example.app").write_to(env.source_dir());
//! env.workspace.install_application(&bundle, InstallOptions::default()).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
