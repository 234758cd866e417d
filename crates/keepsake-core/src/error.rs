//! Error types for the Keepsake application.

use thiserror::Error;

/// A shared error type for the entire Keepsake application.
///
/// Storage, network and validation failures are all converted into one of
/// these variants at the boundary of the component that observed them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeepsakeError {
    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "JSON"
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The backend answered 2xx but reported a failure result.
    #[error("API error: {0}")]
    Api(String),

    /// Local validation failed before any I/O was attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage quota exhausted.
    #[error("Quota exceeded: {needed} bytes requested, {limit} bytes allowed")]
    QuotaExceeded { needed: usize, limit: usize },
}

impl KeepsakeError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates an Http error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates an Api error
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api(message.into())
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Returns true when the backend rejected the credential.
    ///
    /// Only HTTP 401 counts. Every other failure is surfaced to the user
    /// as a retryable error instead of sending them back to sign-in.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Http { status: 401, .. })
    }

    /// Short text suitable for showing inside a transcript message.
    pub fn display_message(&self) -> String {
        match self {
            Self::Http { status, message } if message.trim().is_empty() => {
                format!("HTTP {}", status)
            }
            Self::Http { status, message } => format!("{} {}", status, message.trim()),
            Self::Api(message) | Self::Network(message) | Self::Validation(message) => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for KeepsakeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for KeepsakeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, KeepsakeError>`.
pub type Result<T> = std::result::Result<T, KeepsakeError>;
