//! Client settings configuration.

use serde::{Deserialize, Serialize};

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = "MantisPhpClient";

/// Default number of issues requested per page.
pub const DEFAULT_ISSUES_PER_PAGE: u32 = 50;

/// When the service contract is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Check the service while connecting and fail fast.
    Strict,
    /// Defer any connectivity failure to the first call.
    #[default]
    Lenient,
}

/// Settings applied to every client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// The `User-Agent` header value.
    pub user_agent: String,
    /// Page size used when listing issues.
    pub issues_per_page: u32,
    /// When the service contract is checked.
    pub validation: ValidationMode,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            issues_per_page: DEFAULT_ISSUES_PER_PAGE,
            validation: ValidationMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.user_agent, "MantisPhpClient");
        assert_eq!(settings.issues_per_page, 50);
        assert_eq!(settings.validation, ValidationMode::Lenient);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: ClientSettings = toml::from_str("validation = \"strict\"").unwrap();
        assert_eq!(settings.validation, ValidationMode::Strict);
        assert_eq!(settings.issues_per_page, DEFAULT_ISSUES_PER_PAGE);
    }
}
