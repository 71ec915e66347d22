//! Application registry for appkeep.
//!
//! - [`RegistryIndex`]: the on-disk index (`applications.toml`), written
//!   with copy-then-rename under an advisory file lock so concurrent readers
//!   in other processes never see a torn file.
//! - [`ApplicationRegistry`]: the process-wide view of that index behind a
//!   reader/writer lock. Writers hold a [`RegistryWriteGuard`] for the whole
//!   of a multi-step workflow; readers share a [`RegistryReadGuard`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod index;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use index::{INDEX_SCHEMA_VERSION, RegistryIndex};
pub use registry::{ApplicationRegistry, RegistryReadGuard, RegistryWriteGuard};
