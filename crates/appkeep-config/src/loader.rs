//! Config file discovery and layered loading.
//!
//! 1. Parse `defaults.toml` → base
//! 2. Merge `<home>/config.toml` (user)
//! 3. Apply environment overrides
//! 4. Deserialize merged tree → `Config`
//! 5. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Environment variable overriding the home directory.
pub const HOME_ENV_VAR: &str = "APPKEEP_HOME";

/// Environment variables mapped onto dotted config paths.
const ENV_OVERRIDES: [(&str, &str, &str); 2] = [
    ("APPKEEP_LOG_LEVEL", "logging", "level"),
    ("APPKEEP_LOG_FORMAT", "logging", "format"),
];

/// Load the configuration with layered precedence.
///
/// `home_override` is the appkeep home directory. When `None`, the home is
/// `$APPKEEP_HOME` or `~/.appkeep`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// merged configuration fails validation.
pub fn load(home_override: Option<&Path>) -> ConfigResult<Config> {
    let env_vars: HashMap<String, String> = std::env::vars()
        .filter(|(k, _)| k.starts_with("APPKEEP_"))
        .collect();
    load_with_env(home_override, &env_vars)
}

/// [`load`] with an explicit environment, so tests need not mutate the
/// process environment.
pub(crate) fn load_with_env(
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<Config> {
    let home = match home_override {
        Some(h) => h.to_path_buf(),
        None => home_from_env(env_vars.get(HOME_ENV_VAR).map(String::as_str))?,
    };

    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    // 2. User config.
    let user_path = home.join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge(&mut merged, &overlay);
        info!(path = %user_path.display(), "loaded user config");
    }

    // 3. Environment overrides.
    let applied = apply_env_overrides(&mut merged, env_vars);
    if applied > 0 {
        debug!(count = applied, "applied environment overrides");
    }

    // 4. Deserialize.
    let mut config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // The home the user file came from is the home everything else lives in,
    // unless the file names another one.
    if config.paths.home.is_none() {
        config.paths.home = Some(home);
    }

    // 5. Validate.
    validate::validate(&config)?;
    Ok(config)
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
    })?;

    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if it doesn't exist.
///
/// Reads once and handles `NotFound` instead of checking existence first.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Recursively deep-merge `overlay` into `base`.
///
/// Tables merge per key; scalars and arrays from the overlay replace the
/// base value.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Write environment overrides into the merged tree. Returns how many were
/// applied.
fn apply_env_overrides(merged: &mut toml::Value, env_vars: &HashMap<String, String>) -> usize {
    let Some(root) = merged.as_table_mut() else {
        return 0;
    };
    let mut applied = 0usize;
    for (var, section, key) in ENV_OVERRIDES {
        let Some(value) = env_vars.get(var) else {
            continue;
        };
        let table = root
            .entry(section)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let Some(table) = table.as_table_mut() {
            table.insert(key.to_owned(), toml::Value::String(value.clone()));
            applied = applied.saturating_add(1);
        } else {
            warn!(var, section, "config section is not a table; ignoring env override");
        }
    }
    applied
}

/// Resolve the appkeep home from the process environment:
/// `$APPKEEP_HOME` if set, otherwise `~/.appkeep`.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if `$APPKEEP_HOME` is relative
/// and [`ConfigError::NoHomeDir`] if no user home can be determined.
pub fn resolve_home() -> ConfigResult<PathBuf> {
    home_from_env(std::env::var(HOME_ENV_VAR).ok().as_deref())
}

fn home_from_env(custom: Option<&str>) -> ConfigResult<PathBuf> {
    if let Some(custom) = custom {
        let path = PathBuf::from(custom);
        if !path.is_absolute() {
            return Err(ConfigError::ValidationError {
                field: HOME_ENV_VAR.to_owned(),
                message: format!("home directory must be absolute, got {custom}"),
            });
        }
        return Ok(path);
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".appkeep"))
        .ok_or(ConfigError::NoHomeDir)
}
