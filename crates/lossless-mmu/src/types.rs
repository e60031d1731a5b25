//! Buffer manager type definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ECN marking profile as written in rate maps (thresholds in KB).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EcnProfile {
    pub kmin_kb: u64,
    pub kmax_kb: u64,
    pub pmax: f64,
}

impl EcnProfile {
    /// Parse an ECN profile from a lookup file line
    ///
    /// Format: rate kmin_kb kmax_kb pmax
    /// Example: "100000000000 100 400 0.2"
    pub fn from_line(line: &str) -> Option<(u64, Self)> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return None;
        }

        let rate = parts[0].parse().ok()?;
        let profile = Self {
            kmin_kb: parts[1].parse().ok()?,
            kmax_kb: parts[2].parse().ok()?,
            pmax: parts[3].parse().ok()?,
        };

        Some((rate, profile))
    }

    /// Converts KB thresholds into the byte thresholds used for marking.
    pub fn to_config(&self) -> EcnConfig {
        EcnConfig {
            kmin: self.kmin_kb * 1000,
            kmax: self.kmax_kb * 1000,
            pmax: self.pmax,
        }
    }
}

/// Link bit-rate (bps) -> ECN profile
pub type EcnRateMap = HashMap<u64, EcnProfile>;

/// Per egress port ECN thresholds in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EcnConfig {
    pub kmin: u64,
    pub kmax: u64,
    pub pmax: f64,
}

/// Observed properties of the link behind a switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSpec {
    /// Link bit-rate in bits per second.
    pub rate_bps: u64,
    /// One-way propagation delay in nanoseconds.
    pub delay_ns: u64,
}

/// Byte and packet accounting for one (port, queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueCounters {
    /// Bytes charged to the reserved and shared pools.
    pub ingress_bytes: u64,
    /// Bytes charged to headroom while a pause is in flight.
    pub hdrm_bytes: u64,
    /// Bytes queued toward this egress queue.
    pub egress_bytes: u64,
    /// Set by an explicit pause decision, cleared by the matching resume.
    pub paused: bool,
    pub ingress_queue_length: u32,
    pub egress_queue_length: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecn_profile_from_line() {
        let line = "100000000000 100 400 0.2";
        let (rate, profile) = EcnProfile::from_line(line).unwrap();

        assert_eq!(rate, 100_000_000_000);
        assert_eq!(profile.kmin_kb, 100);
        assert_eq!(profile.kmax_kb, 400);
        assert_eq!(profile.pmax, 0.2);
    }

    #[test]
    fn test_ecn_profile_from_line_invalid() {
        assert!(EcnProfile::from_line("25000000000 5").is_none());
        assert!(EcnProfile::from_line("fast 5 200 0.2").is_none());
    }

    #[test]
    fn test_ecn_profile_to_config() {
        let profile = EcnProfile {
            kmin_kb: 5,
            kmax_kb: 200,
            pmax: 0.01,
        };
        let config = profile.to_config();
        assert_eq!(config.kmin, 5_000);
        assert_eq!(config.kmax, 200_000);
        assert_eq!(config.pmax, 0.01);
    }

    #[test]
    fn test_counters_default_zero() {
        let counters = QueueCounters::default();
        assert_eq!(counters.ingress_bytes, 0);
        assert_eq!(counters.hdrm_bytes, 0);
        assert!(!counters.paused);
    }
}
