//! Error types for caltrack.
//!
//! This module defines all error types used throughout the caltrack crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for caltrack operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Record Errors ===
    /// No record exists with the given id.
    #[error("transducer #{id} not found")]
    NotFound {
        /// The id that was looked up.
        id: u64,
    },

    /// A required record field was blank.
    #[error("missing required field: {field}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
    },

    /// Every id up to `u64::MAX` is taken.
    #[error("no transducer ids left to assign")]
    IdExhausted,

    // === Storage Errors ===
    /// Reading or writing the data file as CSV failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Notification Errors ===
    /// A notifier transport failed to deliver.
    #[error("notification via {transport} failed: {message}")]
    Notify {
        /// Name of the transport.
        transport: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// An email address did not parse.
    #[error("invalid email address {address:?}: {source}")]
    Address {
        /// The rejected address.
        address: String,
        /// The underlying parse error.
        #[source]
        source: lettre::address::AddressError,
    },

    /// The alert email could not be assembled.
    #[error("failed to build email: {0}")]
    Email(#[from] lettre::error::Error),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A specialized Result type for caltrack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a notification error for the named transport.
    #[must_use]
    pub fn notify(transport: &'static str, message: impl Into<String>) -> Self {
        Self::Notify {
            transport,
            message: message.into(),
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error means the requested record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a rejected record field.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
