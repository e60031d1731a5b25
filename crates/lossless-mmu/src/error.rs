//! Error types for buffer manager setup.
//!
//! The admission path itself never fails: every decision there is a boolean.
//! These errors are raised while building the MMU from configuration, where a
//! missing or inconsistent value means the switch cannot safely start.

use std::io;
use thiserror::Error;

/// Result type alias for MMU setup operations.
pub type MmuResult<T> = Result<T, MmuError>;

/// Errors that can occur while configuring the MMU.
#[derive(Debug, Error)]
pub enum MmuError {
    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// No ECN profile was configured for an observed link rate.
    #[error("No ECN profile (kmin/kmax/pmax) configured for link rate {rate} bps")]
    MissingEcnProfile {
        /// Link bit-rate in bits per second.
        rate: u64,
    },

    /// Headroom and reservations exceed the shared buffer.
    #[error("Buffer overcommitted: {committed} bytes of headroom+reserve exceed buffer size {buffer_size}")]
    BufferOvercommitted {
        /// Configured buffer size in bytes.
        buffer_size: u64,
        /// Total headroom plus reserved bytes.
        committed: u64,
    },

    /// Failed to read an ECN lookup or configuration file.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Failed to parse a TOML configuration document.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl MmuError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error for the given path.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
