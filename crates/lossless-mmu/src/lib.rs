//! Lossless MMU - shared-buffer admission control for a lossless switch
//!
//! The MMU keeps per-port/per-priority byte accounting across reserved,
//! shared and headroom pools and turns it into three kinds of decisions:
//! - ingress admission (accept or silently drop)
//! - PFC pause/resume with a hysteresis band
//! - RED-style ECN marking at egress
//!
//! Configuration is static: built once from [`MmuConfig`], optionally derived
//! from observed link rates and an ECN rate-profile lookup file.

pub mod config;
pub mod ecn_lookup;
pub mod error;
pub mod mmu;
pub mod types;

pub use config::{
    headroom_for_link, threshold_shift_for_rate, MmuConfig, PortBufferConfig, DEFAULT_THRESHOLD_SHIFT,
};
pub use ecn_lookup::parse_ecn_lookup_file;
pub use error::{MmuError, MmuResult};
pub use mmu::SwitchMmu;
pub use types::{EcnConfig, EcnProfile, EcnRateMap, LinkSpec, QueueCounters};
