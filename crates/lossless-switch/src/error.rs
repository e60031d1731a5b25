//! Error types for the forwarding engine.

use lossless_mmu::MmuError;
use lossless_types::PortIndex;
use std::io;
use thiserror::Error;

/// Result type alias for switch setup and teardown.
pub type SwitchResult<T> = Result<T, SwitchError>;

/// Errors raised while building or tearing down a switch.
///
/// Nothing on the per-packet path returns these; drops are silent.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Buffer manager configuration error.
    #[error("MMU error: {0}")]
    Mmu(#[from] MmuError),

    /// A route or device references a port outside the configured tables.
    #[error("Port {port} out of range (switch has {port_count} ports)")]
    PortOutOfRange {
        /// Offending port.
        port: PortIndex,
        /// Number of configured data ports.
        port_count: usize,
    },

    /// A link runs at a rate the HPCC hop record cannot encode.
    #[error("Port {port} line rate {rate} bps cannot be encoded in an INT hop")]
    UnsupportedLineRate {
        /// Port index.
        port: PortIndex,
        /// Link bit-rate in bits per second.
        rate: u64,
    },

    /// Failed to parse a TOML configuration document.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Telemetry or configuration file IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SwitchError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}
