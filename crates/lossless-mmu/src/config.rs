//! Buffer pool configuration.
//!
//! Static configuration consumed once when the MMU is built. Values can come
//! from a TOML document or be derived from observed link properties with
//! [`MmuConfig::for_links`].

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MmuError, MmuResult};
use crate::types::{EcnConfig, EcnRateMap, LinkSpec};

/// Default fair-share exponent: each port may claim 1/8 of the free shared buffer.
pub const DEFAULT_THRESHOLD_SHIFT: u32 = 3;

/// Per-port buffer configuration. Entry `i` of [`MmuConfig::ports`] describes port `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortBufferConfig {
    /// Headroom budget in bytes.
    #[serde(default)]
    pub headroom: u64,

    /// Dynamic threshold exponent.
    #[serde(default = "default_threshold_shift")]
    pub threshold_shift: u32,

    /// Guaranteed bytes per queue; falls back to [`MmuConfig::reserve`].
    #[serde(default)]
    pub reserve: Option<u64>,

    /// ECN thresholds for this port as an egress.
    #[serde(default)]
    pub ecn: EcnConfig,
}

impl Default for PortBufferConfig {
    fn default() -> Self {
        Self {
            headroom: 0,
            threshold_shift: default_threshold_shift(),
            reserve: None,
            ecn: EcnConfig::default(),
        }
    }
}

/// Complete MMU configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmuConfig {
    /// Total shared buffer in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u64,

    /// Default guaranteed bytes per queue.
    #[serde(default = "default_reserve")]
    pub reserve: u64,

    /// Hysteresis band between pause and resume, in bytes.
    #[serde(default = "default_resume_offset")]
    pub resume_offset: u64,

    /// Data ports, starting at port 1.
    #[serde(default)]
    pub ports: Vec<PortBufferConfig>,
}

// Default functions
fn default_buffer_size() -> u64 {
    12 * 1024 * 1024
}

fn default_reserve() -> u64 {
    4 * 1024
}

fn default_resume_offset() -> u64 {
    3 * 1024
}

fn default_threshold_shift() -> u32 {
    DEFAULT_THRESHOLD_SHIFT
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            reserve: default_reserve(),
            resume_offset: default_resume_offset(),
            ports: Vec::new(),
        }
    }
}

/// Headroom needed to absorb one pause round trip on a link.
///
/// Three times the bandwidth-delay product of the one-way delay.
pub fn headroom_for_link(rate_bps: u64, delay_ns: u64) -> u64 {
    rate_bps * delay_ns / 8 / 1_000_000_000 * 3
}

/// Threshold exponent for a port, halved (shift decremented) for every
/// doubling of the port rate above the reference NIC rate.
pub fn threshold_shift_for_rate(base_shift: u32, rate_bps: u64, nic_rate_bps: u64) -> u32 {
    let mut shift = base_shift;
    let mut rate = rate_bps;
    while rate > nic_rate_bps && shift > 0 {
        shift -= 1;
        rate /= 2;
    }
    shift
}

impl MmuConfig {
    /// Parse configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> MmuResult<Self> {
        toml::from_str(content).map_err(|e| MmuError::Parse(e.to_string()))
    }

    /// Number of configured data ports.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Reserve applied to a given port entry.
    pub fn port_reserve(&self, port: &PortBufferConfig) -> u64 {
        port.reserve.unwrap_or(self.reserve)
    }

    /// Sum of headroom budgets across all data ports.
    pub fn total_headroom(&self) -> u64 {
        self.ports.iter().map(|p| p.headroom).sum()
    }

    /// Sum of reservations across all data ports.
    ///
    /// One reservation is counted per port.
    pub fn total_reserve(&self) -> u64 {
        self.ports.iter().map(|p| self.port_reserve(p)).sum()
    }

    /// Derive per-port configuration from the links attached to a switch.
    ///
    /// `links[i]` is the link behind port `i + 1`. Every observed rate must
    /// have an ECN profile in `ecn_profiles`.
    pub fn for_links(
        mut self,
        links: &[LinkSpec],
        ecn_profiles: &EcnRateMap,
        nic_rate_bps: u64,
    ) -> MmuResult<Self> {
        let mut ports = Vec::with_capacity(links.len());
        for (i, link) in links.iter().enumerate() {
            let profile = ecn_profiles
                .get(&link.rate_bps)
                .ok_or(MmuError::MissingEcnProfile {
                    rate: link.rate_bps,
                })?;
            let port = PortBufferConfig {
                headroom: headroom_for_link(link.rate_bps, link.delay_ns),
                threshold_shift: threshold_shift_for_rate(
                    DEFAULT_THRESHOLD_SHIFT,
                    link.rate_bps,
                    nic_rate_bps,
                ),
                reserve: None,
                ecn: profile.to_config(),
            };
            info!(
                "Port {} rate {}: headroom={} shift={} kmin={} kmax={} pmax={}",
                i + 1,
                link.rate_bps,
                port.headroom,
                port.threshold_shift,
                port.ecn.kmin,
                port.ecn.kmax,
                port.ecn.pmax
            );
            ports.push(port);
        }
        self.ports = ports;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> MmuResult<()> {
        if self.buffer_size == 0 {
            return Err(MmuError::invalid_config("buffer_size", "must be > 0"));
        }

        for (i, port) in self.ports.iter().enumerate() {
            let field = |name: &str| format!("ports[{}].{}", i, name);
            if port.threshold_shift >= 64 {
                return Err(MmuError::invalid_config(
                    field("threshold_shift"),
                    "must be < 64",
                ));
            }
            if port.ecn.kmin > port.ecn.kmax {
                return Err(MmuError::invalid_config(
                    field("ecn"),
                    format!("kmin {} exceeds kmax {}", port.ecn.kmin, port.ecn.kmax),
                ));
            }
            if !(0.0..=1.0).contains(&port.ecn.pmax) {
                return Err(MmuError::invalid_config(
                    field("ecn.pmax"),
                    "must be within 0-1",
                ));
            }
        }

        let committed = self.total_headroom() + self.total_reserve();
        if committed > self.buffer_size {
            return Err(MmuError::BufferOvercommitted {
                buffer_size: self.buffer_size,
                committed,
            });
        }

        Ok(())
    }
}
