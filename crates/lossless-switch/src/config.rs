//! Switch configuration
//!
//! Loads and validates the forwarding-engine configuration from TOML. The MMU
//! section is embedded as `[mmu]` and validated with the rest.

use crate::error::{SwitchError, SwitchResult};
use crate::pint::PintCodec;
use lossless_mmu::MmuConfig;
use lossless_types::QueueIndex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// In-band telemetry written at dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CcMode {
    /// No in-band telemetry.
    #[default]
    None,
    /// Push one hop record per switch into the INT header.
    Hpcc,
    /// Write the encoded egress utilization into the PINT power field.
    Pint,
}

/// Complete switch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// Switch identifier, used in logs and as the default ECMP seed.
    #[serde(default)]
    pub node_id: u32,

    /// ECMP hash seed; defaults to `node_id`.
    #[serde(default)]
    pub ecmp_seed: Option<u32>,

    /// Rewrite ECN to CE on congested egress queues.
    #[serde(default)]
    pub ecn_enabled: bool,

    /// Put ACK/NACK on the control queue.
    #[serde(default)]
    pub ack_high_prio: bool,

    #[serde(default)]
    pub cc_mode: CcMode,

    /// Max network round-trip time in ns.
    #[serde(default = "default_max_rtt")]
    pub max_rtt: u64,

    /// Telemetry epoch length in ns.
    #[serde(default = "default_epoch_time")]
    pub epoch_time: u64,

    /// Flow-table buckets per (egress port, epoch).
    #[serde(default = "default_flow_entries")]
    pub flow_entries: usize,

    /// Ring slots per epoch in the port-to-port traffic matrix.
    #[serde(default = "default_traffic_matrix_slots")]
    pub traffic_matrix_slots: usize,

    /// A signal is forwarded again only once the event id advances past this window.
    #[serde(default = "default_signal_dedup_window")]
    pub signal_dedup_window: u32,

    /// Egress queue whose pause state counts as sustained pause.
    #[serde(default = "default_pause_watch_queue")]
    pub pause_watch_queue: QueueIndex,

    /// HPCC byte/qlen unit multiplier.
    #[serde(default = "default_int_multi")]
    pub int_multi: u32,

    /// Logarithm base of the PINT utilization code.
    #[serde(default = "default_pint_log_base")]
    pub pint_log_base: f64,

    /// Seed for ECN marking and log2 rounding; entropy when absent.
    #[serde(default)]
    pub rng_seed: Option<u64>,

    #[serde(default)]
    pub mmu: MmuConfig,
}

// Default functions
fn default_max_rtt() -> u64 {
    9000
}

fn default_epoch_time() -> u64 {
    1_000_000
}

fn default_flow_entries() -> usize {
    1 << 12
}

fn default_traffic_matrix_slots() -> usize {
    5
}

fn default_signal_dedup_window() -> u32 {
    500_000
}

fn default_pause_watch_queue() -> QueueIndex {
    QueueIndex::from_traffic_class(3)
}

fn default_int_multi() -> u32 {
    1
}

fn default_pint_log_base() -> f64 {
    1.05
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            ecmp_seed: None,
            ecn_enabled: false,
            ack_high_prio: false,
            cc_mode: CcMode::default(),
            max_rtt: default_max_rtt(),
            epoch_time: default_epoch_time(),
            flow_entries: default_flow_entries(),
            traffic_matrix_slots: default_traffic_matrix_slots(),
            signal_dedup_window: default_signal_dedup_window(),
            pause_watch_queue: default_pause_watch_queue(),
            int_multi: default_int_multi(),
            pint_log_base: default_pint_log_base(),
            rng_seed: None,
            mmu: MmuConfig::default(),
        }
    }
}

impl SwitchConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SwitchResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(
            "Loaded switch {} configuration from {}",
            config.node_id,
            path.display()
        );
        Ok(config)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> SwitchResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SwitchError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Seed actually used for ECMP hashing.
    pub fn effective_ecmp_seed(&self) -> u32 {
        self.ecmp_seed.unwrap_or(self.node_id)
    }

    /// Validate configuration values
    pub fn validate(&self) -> SwitchResult<()> {
        self.mmu.validate()?;

        if self.max_rtt == 0 {
            return Err(SwitchError::invalid_config("max_rtt", "must be > 0"));
        }
        if self.epoch_time == 0 {
            return Err(SwitchError::invalid_config("epoch_time", "must be > 0"));
        }
        if self.flow_entries == 0 {
            return Err(SwitchError::invalid_config("flow_entries", "must be > 0"));
        }
        if self.traffic_matrix_slots == 0 {
            return Err(SwitchError::invalid_config(
                "traffic_matrix_slots",
                "must be > 0",
            ));
        }
        if self.epoch_time % self.traffic_matrix_slots as u64 != 0 {
            return Err(SwitchError::invalid_config(
                "traffic_matrix_slots",
                format!(
                    "epoch_time {} is not divisible into {} slots",
                    self.epoch_time, self.traffic_matrix_slots
                ),
            ));
        }
        if self.int_multi == 0 {
            return Err(SwitchError::invalid_config("int_multi", "must be > 0"));
        }
        PintCodec::new(self.pint_log_base)?;

        Ok(())
    }
}
