//! Error types and handling infrastructure for phiclear.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types. The binary layers `anyhow` on top for context.
//!
//! ## Design Principles
//!
//! - **Never raised from a broadcast**: listener failures are reported, not propagated
//! - **No PHI in messages**: errors carry ids and labels, never cleared values
//! - **Consistency**: Standardized Result type across all modules

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for phiclear operations.
#[derive(Error, Debug)]
pub enum PhiClearError {
    /// A reset listener returned an error while clearing its state
    #[error("Listener {listener} failed to clear: {message}")]
    ListenerFailed { listener: String, message: String },

    /// File system related errors while reading configuration
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file not found at the expected location
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse or validation errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

/// Standard Result type for phiclear operations.
pub type Result<T> = std::result::Result<T, PhiClearError>;

impl PhiClearError {
    /// Create a ListenerFailed error for the given listener description
    pub fn listener(listener: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListenerFailed {
            listener: listener.into(),
            message: message.into(),
        }
    }

    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}
