//! Core types for the appkeep application registry.
//!
//! - [`ApplicationId`]: validated, stable registry key
//! - [`ApplicationRecord`]: read-only snapshot of one installed (or placeholder) application
//! - [`MetadataValue`]: tagged value for entitlements and manifest snapshots
//! - [`AppSummary`]: derived presentation view of a record
//! - [`AppkeepHome`]: on-disk layout of registry state

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod dirs;
pub mod error;
pub mod id;
pub mod metadata;
pub mod record;
pub mod summary;

pub use dirs::{AppkeepHome, is_bundle_relative};
pub use error::{CoreError, CoreResult};
pub use id::ApplicationId;
pub use metadata::{Metadata, MetadataValue, metadata_from_toml};
pub use record::{ApplicationFilter, ApplicationRecord, ApplicationType};
pub use summary::AppSummary;
