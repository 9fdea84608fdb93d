//! Error types and handling infrastructure for rltail.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types. `anyhow` is only used by the binary for startup context.
//!
//! ## Error classes
//!
//! - **Startup fatal**: the catalog root is unusable or holds no text files
//! - **Caller errors**: unknown paths, bad arguments, out-of-range values
//! - **Retryable**: a reconfiguration collided with an in-flight refresh
//! - **Local IO**: a single file failed to read; the poller logs it and moves on

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rltail operations.
#[derive(Error, Debug)]
pub enum RltailError {
    /// File system related errors (unreadable file, vanished file, etc.)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// The catalog root cannot be opened or is not a directory
    #[error("Log directory unavailable: {path}")]
    CatalogUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog root holds no plain-text files
    #[error("No plain-text files found under {path}")]
    EmptyCatalog { path: PathBuf },

    /// Requested path is not part of the catalog
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// A refresh or another reconfiguration currently holds the gate
    #[error("Configuration gate busy, retry later")]
    GateBusy,

    /// A configuration value outside its accepted range
    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    /// A cached snapshot buffer could not be decompressed
    #[error("Unable to decompress snapshot of {path}")]
    DecompressionFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid request or command line arguments
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

/// Standard Result type for rltail operations.
pub type Result<T> = std::result::Result<T, RltailError>;

impl RltailError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a NotFound error for a path outside the catalog
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an InvalidValue error with a descriptive message
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error with a descriptive message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Errors that must stop the process before it starts serving.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::CatalogUnavailable { .. } | Self::EmptyCatalog { .. }
        )
    }

    /// Errors the caller may simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GateBusy)
    }
}

// Automatic conversion from io::Error to RltailError
impl From<std::io::Error> for RltailError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}
