//! Error types and handling for Auriga
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Auriga operations
pub type Result<T> = std::result::Result<T, AurigaError>;

/// Main error type for Auriga
#[derive(Debug, Error)]
pub enum AurigaError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Network/timeout failures talking to the charge-point API
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Authentication/authorization errors (401/403 equivalents)
    #[error("Access denied: {message}")]
    Auth { message: String },

    /// Resource not found. Also the domain retry signal when returned
    /// from session-status polling.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Validation errors, raised before any network call
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Persistence layer errors
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Charge-point API responded with an unexpected payload or status
    #[error("API error: {message}")]
    Api { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl AurigaError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        AurigaError::Config {
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        AurigaError::Transport {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        AurigaError::Auth {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        AurigaError::NotFound {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        AurigaError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        AurigaError::Persistence {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        AurigaError::Api {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        AurigaError::Io {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        AurigaError::Web {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        AurigaError::Generic {
            message: message.into(),
        }
    }

    /// Whether this error is the not-found signal consumed by the
    /// scheduler's retry path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AurigaError::NotFound { .. })
    }
}

impl From<std::io::Error> for AurigaError {
    fn from(err: std::io::Error) -> Self {
        AurigaError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for AurigaError {
    fn from(err: serde_yaml::Error) -> Self {
        AurigaError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AurigaError {
    fn from(err: serde_json::Error) -> Self {
        AurigaError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for AurigaError {
    fn from(err: reqwest::Error) -> Self {
        AurigaError::transport(err.to_string())
    }
}

impl From<chrono::ParseError> for AurigaError {
    fn from(err: chrono::ParseError) -> Self {
        AurigaError::validation("datetime", &err.to_string())
    }
}
