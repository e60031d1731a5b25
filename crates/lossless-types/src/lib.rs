//! Common value types for the lossless switch pipeline.
//!
//! This crate provides type-safe representations of the primitives shared by
//! the buffer manager and the forwarding engine:
//!
//! - [`Ipv4Address`]: IPv4 host addresses as carried in packet headers
//! - [`PortIndex`] / [`QueueIndex`]: switch port and priority-queue indices
//! - [`FiveTuple`]: flow identifier used by ECMP and flow telemetry
//! - [`L3Protocol`]: protocol numbers, including the simulator control protocols
//! - [`EcnCodepoint`]: the two ECN bits of the IPv4 header

mod flow;
mod ip;
mod port;

pub use flow::{EcnCodepoint, FiveTuple, L3Protocol};
pub use ip::Ipv4Address;
pub use port::{PortIndex, QueueIndex, CONTROL_QUEUE, QUEUE_COUNT};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid queue index: {0} (must be 0-7)")]
    InvalidQueueIndex(u32),

    #[error("invalid port index: {0}")]
    InvalidPortIndex(String),

    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),
}
