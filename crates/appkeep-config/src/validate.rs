//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Application type names accepted in `install.protected_types`.
pub const APPLICATION_TYPES: [&str; 3] = ["System", "User", "AppClip"];

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_paths(config)?;
    validate_install(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_paths(config: &Config) -> ConfigResult<()> {
    if let Some(home) = &config.paths.home
        && !home.is_absolute()
    {
        return Err(ConfigError::ValidationError {
            field: "paths.home".to_owned(),
            message: format!("home directory must be absolute, got {}", home.display()),
        });
    }
    Ok(())
}

fn validate_install(config: &Config) -> ConfigResult<()> {
    for ty in &config.install.protected_types {
        if !APPLICATION_TYPES.contains(&ty.as_str()) {
            return Err(ConfigError::ValidationError {
                field: "install.protected_types".to_owned(),
                message: format!(
                    "unknown application type '{ty}'; expected one of: {}",
                    APPLICATION_TYPES.join(", ")
                ),
            });
        }
    }

    if config
        .install
        .protected_identifiers
        .iter()
        .any(|id| id.trim().is_empty())
    {
        return Err(ConfigError::ValidationError {
            field: "install.protected_identifiers".to_owned(),
            message: "protected identifiers must not be empty".to_owned(),
        });
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    Ok(())
}
