//! Credentials handling for the MantisConnect API.
//!
//! Every remote procedure takes the username and password (or API token) as
//! its first two arguments. Secrets can be kept in the OS keyring, keyed by
//! profile name.

use std::fmt;

use super::error::{ApiError, Result};

/// The keyring service name for Mantis client secrets.
const KEYRING_SERVICE: &str = "mantis-client";

/// A username and its password or API token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The configured login name; empty for anonymous access.
    username: String,
    /// The password or API token.
    secret: String,
}

impl Credentials {
    /// Create credentials from a username and secret.
    pub fn new(username: &str, secret: &str) -> Self {
        Self {
            username: username.to_string(),
            secret: secret.to_string(),
        }
    }

    /// Empty credentials, used to test for anonymous access.
    pub fn anonymous() -> Self {
        Self::new("", "")
    }

    /// Load the secret for a profile from the OS keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot be retrieved from the keyring.
    pub fn from_keyring(profile_name: &str, username: &str) -> Result<Self> {
        let secret = get_secret(profile_name)?;
        Ok(Self::new(username, &secret))
    }

    /// The configured username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password or API token.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Whether these are the empty anonymous credentials.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Store a password or API token in the OS keyring.
///
/// # Errors
///
/// Returns an error if the secret cannot be stored in the keyring.
pub fn store_secret(profile_name: &str, secret: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, profile_name)
        .map_err(|e| ApiError::Keyring(format!("failed to create keyring entry: {}", e)))?;

    entry
        .set_password(secret)
        .map_err(|e| ApiError::Keyring(format!("failed to store secret: {}", e)))?;

    Ok(())
}

/// Retrieve a password or API token from the OS keyring.
///
/// # Errors
///
/// Returns an error if the secret cannot be retrieved from the keyring.
pub fn get_secret(profile_name: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, profile_name)
        .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))?;

    entry
        .get_password()
        .map_err(|e| ApiError::Keyring(format!("failed to retrieve secret: {}", e)))
}

/// Delete a password or API token from the OS keyring.
///
/// # Errors
///
/// Returns an error if the secret cannot be deleted from the keyring.
pub fn delete_secret(profile_name: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, profile_name)
        .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))?;

    entry
        .delete_password()
        .map_err(|e| ApiError::Keyring(format!("failed to delete secret: {}", e)))?;

    Ok(())
}

/// Check if a secret exists in the OS keyring for a profile.
pub fn has_secret(profile_name: &str) -> bool {
    get_secret(profile_name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let credentials = Credentials::new("alice", "api-token");
        assert_eq!(credentials.username(), "alice");
        assert_eq!(credentials.secret(), "api-token");
        assert!(!credentials.is_anonymous());
    }

    #[test]
    fn test_anonymous_credentials() {
        let credentials = Credentials::anonymous();
        assert_eq!(credentials.username(), "");
        assert_eq!(credentials.secret(), "");
        assert!(credentials.is_anonymous());
    }

    #[test]
    fn test_credentials_do_not_expose_secret() {
        let credentials = Credentials::new("alice", "secret_token");
        let debug_output = format!("{:?}", credentials);

        assert!(debug_output.contains("alice"));
        assert!(!debug_output.contains("secret_token"));
    }
}
