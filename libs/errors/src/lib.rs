//! Unified error handling for the ASA manager
//!
//! Every failure that originates outside the input data itself (storage,
//! device registry, export target, configuration) is expressed as an
//! [`AsaError`]. Per-item data problems live in `asa-model` instead.

use thiserror::Error;

// ============================================================================
// AsaError - dependency and configuration errors
// ============================================================================

/// Main error type for the ASA manager collaborators
#[derive(Debug, Error)]
pub enum AsaError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Storage Errors
    // ======================================
    #[error("Storage error: {0}")]
    Storage(String),

    // ======================================
    // Device Registry Errors
    // ======================================
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Device registry returned {status}: {message}")]
    Registry { status: u16, message: String },

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    // ======================================
    // Data Errors
    // ======================================
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    // ======================================
    // File & Runtime Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AsaError
pub type Result<T> = std::result::Result<T, AsaError>;

impl AsaError {
    /// Build a storage error from any displayable cause
    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Check if this error is retryable
    ///
    /// Retries are the caller's business; this only tells it whether a
    /// blind re-run has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Storage(_) | Self::Io(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Registry { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Http(_) => "HTTP_CLIENT_ERROR",
            Self::Registry { .. } => "REGISTRY_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<figment::Error> for AsaError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}
