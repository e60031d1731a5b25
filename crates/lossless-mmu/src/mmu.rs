//! Switch MMU - shared-buffer admission, PFC hysteresis and ECN marking
//!
//! Each (port, queue) draws from three pools: a reserved allocation it always
//! owns, a shared pool bounded by a dynamic threshold, and a per-port headroom
//! that absorbs packets still in flight after a pause has been sent upstream.

use lossless_types::{PortIndex, QueueIndex, QUEUE_COUNT};
use rand::Rng;
use tracing::{debug, info, trace};

use crate::config::MmuConfig;
use crate::error::MmuResult;
use crate::types::{EcnConfig, QueueCounters};

/// Resolved per-port buffer parameters.
#[derive(Debug, Clone, Copy, Default)]
struct PortBuffer {
    headroom: u64,
    threshold_shift: u32,
    reserve: u64,
    ecn: EcnConfig,
}

/// Switch memory management unit
///
/// All tables are sized at construction; the admission path only indexes
/// fixed arrays. Port 0 (loopback) has an all-zero configuration.
#[derive(Debug, Clone)]
pub struct SwitchMmu {
    node_id: u32,
    buffer_size: u64,
    resume_offset: u64,
    total_headroom: u64,
    total_reserve: u64,

    ports: Vec<PortBuffer>,
    counters: Vec<[QueueCounters; QUEUE_COUNT]>,

    /// Bytes above the reserved line across every (port, queue).
    shared_used_bytes: u64,
}

impl SwitchMmu {
    /// Build an MMU from validated configuration.
    pub fn new(node_id: u32, config: &MmuConfig) -> MmuResult<Self> {
        config.validate()?;

        let mut ports = Vec::with_capacity(config.port_count() + 1);
        ports.push(PortBuffer::default());
        ports.extend(config.ports.iter().map(|p| PortBuffer {
            headroom: p.headroom,
            threshold_shift: p.threshold_shift,
            reserve: config.port_reserve(p),
            ecn: p.ecn,
        }));

        let mmu = Self {
            node_id,
            buffer_size: config.buffer_size,
            resume_offset: config.resume_offset,
            total_headroom: config.total_headroom(),
            total_reserve: config.total_reserve(),
            counters: vec![[QueueCounters::default(); QUEUE_COUNT]; ports.len()],
            ports,
            shared_used_bytes: 0,
        };

        info!(
            "Switch {} MMU initialized: {} ports, buffer={} headroom={} reserve={}",
            node_id,
            config.port_count(),
            mmu.buffer_size,
            mmu.total_headroom,
            mmu.total_reserve
        );

        Ok(mmu)
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Number of data ports (port indices 1..=port_count are valid).
    pub fn port_count(&self) -> usize {
        self.ports.len() - 1
    }

    /// Returns true if the port index addresses a configured port (including loopback 0).
    pub fn has_port(&self, port: PortIndex) -> bool {
        port.as_usize() < self.ports.len()
    }

    pub fn buffer_size(&self) -> u64 {
        self.buffer_size
    }

    pub fn total_headroom(&self) -> u64 {
        self.total_headroom
    }

    pub fn total_reserve(&self) -> u64 {
        self.total_reserve
    }

    pub fn shared_used_bytes(&self) -> u64 {
        self.shared_used_bytes
    }

    /// Snapshot of the accounting for one (port, queue).
    pub fn counters(&self, port: PortIndex, queue: QueueIndex) -> &QueueCounters {
        &self.counters[port.as_usize()][queue.as_usize()]
    }

    fn counters_mut(&mut self, port: PortIndex, queue: QueueIndex) -> &mut QueueCounters {
        &mut self.counters[port.as_usize()][queue.as_usize()]
    }

    /// Reject only when the headroom budget and the shared threshold are both exhausted.
    pub fn check_ingress_admission(&self, port: PortIndex, queue: QueueIndex, size: u32) -> bool {
        let size = u64::from(size);
        let headroom = self.ports[port.as_usize()].headroom;
        let hdrm_bytes = self.counters(port, queue).hdrm_bytes;

        if size + hdrm_bytes > headroom
            && size + self.shared_used(port, queue) > self.pfc_threshold(port)
        {
            debug!(
                "Switch {} drop: queue {}:{} headroom full (hdrm={}, shared={})",
                self.node_id,
                port,
                queue,
                hdrm_bytes,
                self.shared_used_bytes
            );
            return false;
        }
        true
    }

    /// Egress admission is accounting only.
    pub fn check_egress_admission(&self, _port: PortIndex, _queue: QueueIndex, _size: u32) -> bool {
        true
    }

    pub fn update_ingress_admission(&mut self, port: PortIndex, queue: QueueIndex, size: u32) {
        let size = u64::from(size);
        let reserve = self.ports[port.as_usize()].reserve;
        let new_bytes = self.counters(port, queue).ingress_bytes + size;

        if new_bytes <= reserve {
            self.counters_mut(port, queue).ingress_bytes += size;
        } else {
            let thresh = self.pfc_threshold(port);
            if new_bytes - reserve > thresh {
                self.counters_mut(port, queue).hdrm_bytes += size;
            } else {
                self.counters_mut(port, queue).ingress_bytes += size;
                self.shared_used_bytes += size.min(new_bytes - reserve);
            }
        }

        self.counters_mut(port, queue).ingress_queue_length += 1;
    }

    pub fn update_egress_admission(&mut self, port: PortIndex, queue: QueueIndex, size: u32) {
        let counters = self.counters_mut(port, queue);
        counters.egress_bytes += u64::from(size);
        counters.egress_queue_length += 1;
    }

    /// Release headroom first, then reserved/shared bytes.
    pub fn remove_from_ingress_admission(&mut self, port: PortIndex, queue: QueueIndex, size: u32) {
        let size = u64::from(size);
        let reserve = self.ports[port.as_usize()].reserve;
        let counters = self.counters_mut(port, queue);

        let from_hdrm = counters.hdrm_bytes.min(size);
        let from_ingress = size - from_hdrm;
        let above_reserve = counters.ingress_bytes.saturating_sub(reserve);
        let from_shared = from_ingress.min(above_reserve);

        counters.hdrm_bytes -= from_hdrm;
        counters.ingress_bytes = counters.ingress_bytes.saturating_sub(from_ingress);
        counters.ingress_queue_length = counters.ingress_queue_length.saturating_sub(1);
        self.shared_used_bytes = self.shared_used_bytes.saturating_sub(from_shared);
    }

    pub fn remove_from_egress_admission(&mut self, port: PortIndex, queue: QueueIndex, size: u32) {
        let counters = self.counters_mut(port, queue);
        counters.egress_bytes = counters.egress_bytes.saturating_sub(u64::from(size));
        counters.egress_queue_length = counters.egress_queue_length.saturating_sub(1);
    }

    /// True iff not paused and headroom is in use or the shared threshold is reached.
    pub fn check_should_pause(&self, port: PortIndex, queue: QueueIndex) -> bool {
        let counters = self.counters(port, queue);
        !counters.paused
            && (counters.hdrm_bytes > 0
                || self.shared_used(port, queue) >= self.pfc_threshold(port))
    }

    /// True iff paused, headroom drained, and shared usage is back below the hysteresis band.
    pub fn check_should_resume(&self, port: PortIndex, queue: QueueIndex) -> bool {
        let counters = self.counters(port, queue);
        if !counters.paused {
            return false;
        }
        let shared_used = self.shared_used(port, queue);
        counters.hdrm_bytes == 0
            && (shared_used == 0
                || shared_used + self.resume_offset <= self.pfc_threshold(port))
    }

    pub fn set_pause(&mut self, port: PortIndex, queue: QueueIndex) {
        trace!("Switch {} queue {}:{} paused", self.node_id, port, queue);
        self.counters_mut(port, queue).paused = true;
    }

    pub fn set_resume(&mut self, port: PortIndex, queue: QueueIndex) {
        trace!("Switch {} queue {}:{} resumed", self.node_id, port, queue);
        self.counters_mut(port, queue).paused = false;
    }

    pub fn is_paused(&self, port: PortIndex, queue: QueueIndex) -> bool {
        self.counters(port, queue).paused
    }

    /// Dynamic shared-buffer threshold for a port.
    pub fn pfc_threshold(&self, port: PortIndex) -> u64 {
        let free = self
            .buffer_size
            .saturating_sub(self.total_headroom)
            .saturating_sub(self.total_reserve)
            .saturating_sub(self.shared_used_bytes);
        free >> self.ports[port.as_usize()].threshold_shift
    }

    /// Bytes this (port, queue) holds above its reserved line.
    pub fn shared_used(&self, port: PortIndex, queue: QueueIndex) -> u64 {
        let used = self.counters(port, queue).ingress_bytes;
        used.saturating_sub(self.ports[port.as_usize()].reserve)
    }

    /// Marking probability for the current egress depth.
    pub fn ecn_mark_probability(&self, port: PortIndex, queue: QueueIndex) -> f64 {
        if queue.is_control() {
            return 0.0;
        }
        let ecn = &self.ports[port.as_usize()].ecn;
        let egress_bytes = self.counters(port, queue).egress_bytes;
        if egress_bytes > ecn.kmax {
            1.0
        } else if egress_bytes > ecn.kmin {
            ecn.pmax * (egress_bytes - ecn.kmin) as f64 / (ecn.kmax - ecn.kmin) as f64
        } else {
            0.0
        }
    }

    /// RED-style marking decision for a packet leaving (port, queue).
    pub fn should_send_cn<R: Rng + ?Sized>(
        &self,
        port: PortIndex,
        queue: QueueIndex,
        rng: &mut R,
    ) -> bool {
        if queue.is_control() {
            return false;
        }
        let ecn = &self.ports[port.as_usize()].ecn;
        let egress_bytes = self.counters(port, queue).egress_bytes;
        if egress_bytes > ecn.kmax {
            return true;
        }
        if egress_bytes > ecn.kmin {
            let p = self.ecn_mark_probability(port, queue);
            return rng.gen::<f64>() < p;
        }
        false
    }
}
