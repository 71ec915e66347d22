//! Application identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Maximum accepted identifier length in bytes.
const MAX_ID_LEN: usize = 255;

/// Stable registry key for an application.
///
/// Identifiers are reverse-DNS style strings such as `"com.example.app"`.
/// They must be non-empty, contain only ASCII alphanumerics, `.`, `-` and
/// `_`, and must not start or end with a dot or contain `..`. The same
/// string is used as a path component inside the index, so anything that
/// could escape a directory is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ApplicationId(String);

/// Deserialize with validation so a hand-edited index cannot smuggle in
/// malformed identifiers.
impl<'de> Deserialize<'de> for ApplicationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl ApplicationId {
    /// Create a new `ApplicationId`, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidId`] if the identifier is empty, too long,
    /// or contains characters outside the allowed set.
    pub fn new(id: impl Into<String>) -> CoreResult<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create an `ApplicationId` without validation (for tests and constants).
    #[must_use]
    pub fn from_static(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> CoreResult<()> {
        if id.is_empty() {
            return Err(CoreError::InvalidId(
                "application identifier must not be empty".into(),
            ));
        }
        if id.len() > MAX_ID_LEN {
            return Err(CoreError::InvalidId(format!(
                "application identifier exceeds {MAX_ID_LEN} bytes"
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(CoreError::InvalidId(format!(
                "application identifier may only contain ASCII alphanumerics, \
                 '.', '-' and '_', got: {id}"
            )));
        }
        if id.starts_with('.') || id.ends_with('.') || id.contains("..") {
            return Err(CoreError::InvalidId(format!(
                "application identifier has an empty dot-separated component: {id}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ApplicationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ApplicationId {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
