//! Lossless switch forwarding engine
//!
//! The packet pipeline of a lossless datacenter switch, built on the buffer
//! manager in `lossless-mmu`:
//!
//! - ECMP next-hop selection with a MurmurHash3 flow hash
//! - priority classification and MMU admission with PFC pause/resume
//! - ECN rewrite at dequeue
//! - double-buffered flow/port telemetry and a sliding port-to-port matrix
//! - HPCC hop stamping and PINT utilization encoding
//! - signal/polling reports written through a [`TelemetryWriter`]
//!
//! The engine is single-threaded and event-driven: the caller supplies the
//! virtual time with each event and owns the event ordering.

pub mod config;
pub mod device;
pub mod ecmp;
pub mod engine;
pub mod error;
pub mod int_header;
pub mod packet;
pub mod pint;
pub mod report;
pub mod telemetry;

pub use config::{CcMode, SwitchConfig};
pub use device::{PfcAction, SwitchDevices};
pub use ecmp::{murmur3_32, RoutingTable};
pub use engine::{classify, ForwardingEngine, ForwardingStats};
pub use error::{SwitchError, SwitchResult};
pub use int_header::{IntHeader, IntHop};
pub use packet::Packet;
pub use pint::{log2_approx, logres_shift, PintCodec, PortUtilization};
pub use report::{ReportKind, TelemetryWriter, TrafficMeter};
pub use telemetry::{EpochClock, FlowEntry, PortEntry, TelemetryTables};
