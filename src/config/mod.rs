//! Configuration management for the Mantis client.
//!
//! This module handles loading and saving the configuration file, which
//! holds named connection profiles and the client settings applied to every
//! session. Secrets never go in this file; see [`crate::api::auth`].

mod profile;
mod settings;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use profile::Profile;
pub use settings::{ClientSettings, ValidationMode, DEFAULT_ISSUES_PER_PAGE, DEFAULT_USER_AGENT};

/// Name of the directory holding the configuration file.
const CONFIG_DIR_NAME: &str = "mantis-client";

/// Name of the configuration file.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform configuration directory.
    #[error("could not determine configuration directory")]
    NoConfigDir,

    /// The configuration directory could not be created.
    #[error("could not create configuration directory: {0}")]
    CreateDirError(std::io::Error),

    /// The configuration file could not be read.
    #[error("could not read configuration file: {0}")]
    ReadError(std::io::Error),

    /// The configuration file could not be written.
    #[error("could not write configuration file: {0}")]
    WriteError(std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("could not serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A value failed validation.
    #[error("{0}")]
    ValidationError(String),

    /// The requested profile does not exist.
    #[error("profile '{0}' not found")]
    ProfileNotFound(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// The configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The name of the default profile to use.
    pub default_profile: Option<String>,
    /// Client settings.
    pub client: ClientSettings,
    /// Connection profiles.
    pub profiles: Vec<Profile>,
}

impl Config {
    /// Path of the configuration file in the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoConfigDir` if the platform has none.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the configuration from the default location.
    ///
    /// A missing file yields the default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load and validate the configuration from `path`.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;

        debug!(path = %path.display(), profiles = config.profiles.len(), "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    /// Validate and save the configuration to `path`, creating parent
    /// directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::CreateDirError)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Validate all profiles and settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first problem.
    pub fn validate(&self) -> Result<()> {
        for profile in &self.profiles {
            profile.validate()?;
        }

        for (index, profile) in self.profiles.iter().enumerate() {
            if self.profiles[..index].iter().any(|p| p.name == profile.name) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate profile name '{}'",
                    profile.name
                )));
            }
        }

        if self.client.issues_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "issues_per_page must be greater than zero".to_string(),
            ));
        }

        if let Some(name) = &self.default_profile {
            if self.profile(name).is_none() {
                return Err(ConfigError::ProfileNotFound(name.clone()));
            }
        }

        Ok(())
    }

    /// Find a profile by name.
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// The profile to use: the named one, else the default one, else the
    /// first configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ProfileNotFound` if nothing matches.
    pub fn select_profile(&self, name: Option<&str>) -> Result<&Profile> {
        let wanted = name.or(self.default_profile.as_deref());
        match wanted {
            Some(name) => self
                .profile(name)
                .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string())),
            None => self
                .profiles
                .first()
                .ok_or_else(|| ConfigError::ProfileNotFound("<default>".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Config {
        Config {
            default_profile: Some("work".to_string()),
            client: ClientSettings::default(),
            profiles: vec![
                Profile::new(
                    "work".to_string(),
                    "https://mantis.example.com".to_string(),
                    "alice".to_string(),
                ),
                Profile::new(
                    "public".to_string(),
                    "bugs.example.org".to_string(),
                    String::new(),
                ),
            ],
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        sample().save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_parse_error_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "profiles = 3").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_duplicate_profiles_rejected() {
        let mut config = sample();
        config.profiles.push(config.profiles[0].clone());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_unknown_default_profile_rejected() {
        let mut config = sample();
        config.default_profile = Some("missing".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ProfileNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut config = sample();
        config.client.issues_per_page = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_select_profile() {
        let config = sample();
        assert_eq!(config.select_profile(None).unwrap().name, "work");
        assert_eq!(config.select_profile(Some("public")).unwrap().name, "public");
        assert!(config.select_profile(Some("nope")).is_err());

        let no_default = Config {
            default_profile: None,
            ..sample()
        };
        assert_eq!(no_default.select_profile(None).unwrap().name, "work");
        assert!(Config::default().select_profile(None).is_err());
    }
}
