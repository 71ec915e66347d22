#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Configuration for the appkeep application registry.
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`APPKEEP_LOG_LEVEL`, `APPKEEP_LOG_FORMAT`)
//! 2. **User** (`<home>/config.toml`, home being `$APPKEEP_HOME` or `~/.appkeep`)
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate depends on no other appkeep crate. Strings such as
//! application type names are validated here and converted to domain types
//! by the consumer.

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{HOME_ENV_VAR, resolve_home};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// `home_dir` overrides the appkeep home directory used to find the
    /// user config file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a config file is malformed or the final
    /// configuration fails validation.
    pub fn load(home_dir: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(home_dir)
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
