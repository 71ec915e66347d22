//! Logging for the appkeep application registry.
//!
//! Library crates only emit `tracing` events; the embedding process decides
//! where they go by calling [`setup_logging`] once at startup.
//!
//! ```rust,no_run
//! use appkeep_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), appkeep_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("appkeep_registry=trace");
//! setup_logging(&config)?;
//! tracing::info!("registry opened");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    DEFAULT_LOG_FILE_PREFIX, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
