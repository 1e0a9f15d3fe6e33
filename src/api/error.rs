//! API error types for the Mantis client.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when talking to a MantisBT SOAP endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service could not be reached, or its contract could not be
    /// fetched or understood.
    #[error("Problem connecting web service: {0}")]
    Connectivity(String),

    /// The service answered with a SOAP fault.
    #[error("SOAP fault [{code}]: {message}")]
    Protocol {
        /// The fault code reported by the service.
        code: String,
        /// The fault string reported by the service.
        message: String,
    },

    /// The operation requires a newer MantisBT release.
    #[error("{operation}() can only be called on v{required}+")]
    Unsupported {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Minimum MantisBT version that supports it.
        required: &'static str,
    },

    /// The call went through but the service reported failure.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// A local file could not be read.
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        /// The path that was being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Network or HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Keyring error when storing/retrieving secrets.
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// Invalid response from the service.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Build a protocol fault from a code and message.
    pub fn fault(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Protocol {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a fault reported by the remote service.
    pub fn is_fault(&self) -> bool {
        matches!(self, ApiError::Protocol { .. })
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidResponse(format!("Failed to decode response: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        let err = ApiError::fault("Client", "Access denied");
        assert_eq!(err.to_string(), "SOAP fault [Client]: Access denied");
        assert!(err.is_fault());
    }

    #[test]
    fn test_unsupported_names_required_version() {
        let err = ApiError::Unsupported {
            operation: "userExists",
            required: "1.2.16",
        };
        assert_eq!(err.to_string(), "userExists() can only be called on v1.2.16+");
        assert!(!err.is_fault());
    }

    #[test]
    fn test_io_display_includes_path() {
        let err = ApiError::Io {
            path: PathBuf::from("/tmp/missing.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "Cannot read '/tmp/missing.txt': no such file");
    }

    #[test]
    fn test_json_error_becomes_invalid_response() {
        let json_err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err: ApiError = json_err.into();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
