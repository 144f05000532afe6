//! Error types and handling for Ososync
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Ososync operations
pub type Result<T> = std::result::Result<T, OsosyncError>;

/// Main error type for Ososync
#[derive(Debug, Error)]
pub enum OsosyncError {
    /// Configuration-related errors, including a missing refresh token
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Credential issuance or refresh exchange failed
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Non-2xx response from the OSOS data endpoints
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Validation errors (malformed timestamps, numeric fields, config values)
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Consumption store errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl OsosyncError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        OsosyncError::Config {
            message: message.into(),
        }
    }

    /// Create a new authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        OsosyncError::Auth {
            message: message.into(),
        }
    }

    /// Create a new API error with the HTTP status it carries
    pub fn api<S: Into<String>>(status: u16, message: S) -> Self {
        OsosyncError::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        OsosyncError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        OsosyncError::Storage {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        OsosyncError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        OsosyncError::Network {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        OsosyncError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        OsosyncError::Generic {
            message: message.into(),
        }
    }

    /// Whether this error is an HTTP 401 from a data endpoint.
    ///
    /// The import path retries such a request exactly once after a forced
    /// credential refresh.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, OsosyncError::Api { status: 401, .. })
    }
}

impl From<std::io::Error> for OsosyncError {
    fn from(err: std::io::Error) -> Self {
        OsosyncError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for OsosyncError {
    fn from(err: serde_yaml::Error) -> Self {
        OsosyncError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for OsosyncError {
    fn from(err: serde_json::Error) -> Self {
        OsosyncError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for OsosyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OsosyncError::timeout(err.to_string())
        } else {
            OsosyncError::network(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for OsosyncError {
    fn from(err: rusqlite::Error) -> Self {
        OsosyncError::storage(err.to_string())
    }
}

impl From<chrono::ParseError> for OsosyncError {
    fn from(err: chrono::ParseError) -> Self {
        OsosyncError::validation("datetime", &err.to_string())
    }
}
