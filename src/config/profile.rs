//! MantisBT profile configuration.

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};

/// A MantisBT profile configuration.
///
/// Profiles store connection details for a MantisBT instance.
/// Passwords and API tokens are stored separately in the OS keychain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// The name of this profile.
    ///
    /// Must be non-empty and unique across all profiles.
    pub name: String,

    /// The instance address.
    ///
    /// May be a bare host, the instance root or the SOAP endpoint itself.
    pub url: String,

    /// The login name; empty for anonymous access.
    #[serde(default)]
    pub username: String,
}

impl Profile {
    /// Create a new profile.
    pub fn new(name: String, url: String, username: String) -> Self {
        Self {
            name,
            url,
            username,
        }
    }

    /// Validate this profile.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` with details if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "profile name cannot be empty".to_string(),
            ));
        }

        if self.name.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "profile name '{}' cannot contain whitespace",
                self.name
            )));
        }

        if self.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': URL cannot be empty",
                self.name
            )));
        }

        if self.url.trim().contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': URL '{}' cannot contain whitespace",
                self.name, self.url
            )));
        }

        Ok(())
    }

    /// Whether this profile logs in anonymously.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }
}
