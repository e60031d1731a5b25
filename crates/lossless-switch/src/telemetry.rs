//! Telemetry aggregation tables.
//!
//! All tables are allocated once from the configured port count and flow
//! capacity; updates only index into them. Two epochs are kept per table as a
//! rotating double buffer, and an entry older than one full cycle is treated
//! as empty on its next update.

use crate::ecmp::{murmur3_32, FLOW_HASH_SEED};
use lossless_types::{FiveTuple, PortIndex, QueueIndex, QUEUE_COUNT};

/// Epochs retained per table.
pub const EPOCH_COUNT: usize = 2;

/// Maps virtual time onto epoch slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochClock {
    epoch_time: u64,
}

impl EpochClock {
    pub fn new(epoch_time: u64) -> Self {
        Self {
            epoch_time: epoch_time.max(1),
        }
    }

    pub fn epoch_time(&self) -> u64 {
        self.epoch_time
    }

    /// Slot of the epoch containing `now`.
    pub fn index(&self, now: u64) -> usize {
        (now / self.epoch_time % EPOCH_COUNT as u64) as usize
    }

    /// Slot of the epoch before `epoch`.
    pub fn previous(epoch: usize) -> usize {
        (epoch + EPOCH_COUNT - 1) % EPOCH_COUNT
    }

    /// Slot of the epoch after `epoch`.
    pub fn next(epoch: usize) -> usize {
        (epoch + 1) % EPOCH_COUNT
    }

    /// An entry last touched at `last` is reused from scratch.
    pub fn is_expired(&self, now: u64, last: u64) -> bool {
        now.saturating_sub(last) > self.epoch_time * (EPOCH_COUNT as u64 - 1)
    }

    /// Age bound for reporting an entry of the current epoch.
    pub fn current_window(&self) -> u64 {
        self.epoch_time * (EPOCH_COUNT as u64 - 1)
    }

    /// Age bound for reporting an entry of the previous epoch.
    pub fn last_window(&self) -> u64 {
        self.epoch_time * EPOCH_COUNT as u64
    }
}

/// Per-flow counters for one (egress port, epoch, bucket).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowEntry {
    pub tuple: FiveTuple,
    pub min_seq: u16,
    pub max_seq: u16,
    pub packet_num: u32,
    /// Sum of egress queue lengths seen at enqueue, excluding the packet itself.
    pub enq_qdepth: u32,
    pub pfc_paused_packet_num: u32,
    pub last_time_step: u64,
}

/// Per-port aggregate of the same counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortEntry {
    pub enq_qdepth: u32,
    pub pfc_paused_packet_num: u32,
    pub packet_num: u32,
    pub last_time_step: u64,
}

/// What the egress side looked like when a packet was enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueSample {
    /// Egress queue length, including the packet just admitted.
    pub queue_length: u32,
    /// Egress queue is currently pause-blocked.
    pub paused: bool,
}

/// Flow and port tables, double-buffered by epoch.
#[derive(Debug, Clone)]
pub struct TelemetryTables {
    clock: EpochClock,
    port_slots: usize,
    flow_entries: usize,
    flows: Vec<FlowEntry>,
    ports: Vec<PortEntry>,
}

impl TelemetryTables {
    /// `port_slots` includes port 0.
    pub fn new(port_slots: usize, flow_entries: usize, clock: EpochClock) -> Self {
        let flow_entries = flow_entries.max(1);
        Self {
            clock,
            port_slots,
            flow_entries,
            flows: vec![FlowEntry::default(); port_slots * EPOCH_COUNT * flow_entries],
            ports: vec![PortEntry::default(); EPOCH_COUNT * port_slots],
        }
    }

    pub fn clock(&self) -> &EpochClock {
        &self.clock
    }

    pub fn flow_entries(&self) -> usize {
        self.flow_entries
    }

    /// Bucket of a flow; collisions share the bucket.
    pub fn flow_index(&self, tuple: &FiveTuple) -> usize {
        murmur3_32(&tuple.hash_key(), FLOW_HASH_SEED) as usize % self.flow_entries
    }

    fn flow_base(&self, port: PortIndex, epoch: usize) -> usize {
        (port.as_usize() * EPOCH_COUNT + epoch) * self.flow_entries
    }

    /// All buckets of one (egress port, epoch).
    pub fn flows(&self, port: PortIndex, epoch: usize) -> &[FlowEntry] {
        let base = self.flow_base(port, epoch);
        &self.flows[base..base + self.flow_entries]
    }

    pub fn port_entry(&self, port: PortIndex, epoch: usize) -> &PortEntry {
        &self.ports[epoch * self.port_slots + port.as_usize()]
    }

    /// Account one admitted packet to its flow bucket and its egress port.
    pub fn record(
        &mut self,
        now: u64,
        port: PortIndex,
        tuple: FiveTuple,
        seq: u32,
        sample: EnqueueSample,
    ) {
        let epoch = self.clock.index(now);
        self.record_flow(now, port, epoch, tuple, seq, sample);
        self.record_port(now, port, epoch, sample);
    }

    fn record_flow(
        &mut self,
        now: u64,
        port: PortIndex,
        epoch: usize,
        tuple: FiveTuple,
        seq: u32,
        sample: EnqueueSample,
    ) {
        let idx = self.flow_base(port, epoch) + self.flow_index(&tuple);
        let expired = self.clock.is_expired(now, self.flows[idx].last_time_step);
        let entry = &mut self.flows[idx];
        let seq = (seq & 0xffff) as u16;
        let depth = sample.queue_length.saturating_sub(1);

        if entry.tuple == tuple && !expired {
            entry.min_seq = entry.min_seq.min(seq);
            entry.max_seq = entry.max_seq.max(seq);
            entry.packet_num = entry.packet_num.wrapping_add(1);
            if sample.paused {
                entry.pfc_paused_packet_num = entry.pfc_paused_packet_num.wrapping_add(1);
            } else {
                entry.enq_qdepth = entry.enq_qdepth.wrapping_add(depth);
            }
        } else {
            entry.tuple = tuple;
            entry.min_seq = seq;
            entry.max_seq = seq;
            entry.packet_num = 1;
            entry.pfc_paused_packet_num = 0;
            // A paused first packet leaves the previous occupant's depth in place.
            if sample.paused {
                entry.pfc_paused_packet_num = 1;
            } else {
                entry.enq_qdepth = depth;
            }
        }
        entry.last_time_step = now;
    }

    fn record_port(&mut self, now: u64, port: PortIndex, epoch: usize, sample: EnqueueSample) {
        let idx = epoch * self.port_slots + port.as_usize();
        let expired = self.clock.is_expired(now, self.ports[idx].last_time_step);
        let entry = &mut self.ports[idx];
        let depth = sample.queue_length.saturating_sub(1);

        if expired {
            *entry = PortEntry {
                enq_qdepth: depth,
                pfc_paused_packet_num: 0,
                packet_num: 1,
                last_time_step: now,
            };
        } else {
            entry.enq_qdepth = entry.enq_qdepth.wrapping_add(depth);
            entry.packet_num = entry.packet_num.wrapping_add(1);
            if sample.paused {
                entry.pfc_paused_packet_num = entry.pfc_paused_packet_num.wrapping_add(1);
            }
            entry.last_time_step = now;
        }
    }

    /// Paused packets seen on `port` in the current or the following epoch slot.
    pub fn paused_recently(&self, now: u64, port: PortIndex) -> bool {
        let epoch = self.clock.index(now);
        self.port_entry(port, epoch).pfc_paused_packet_num > 0
            || self.port_entry(port, EpochClock::next(epoch)).pfc_paused_packet_num > 0
    }
}

/// Sliding-window byte counts between ingress and egress ports.
///
/// One epoch is divided into `slots` ring slots. Entering a new slot subtracts
/// that slot's stale bytes from every total before reusing it.
#[derive(Debug, Clone)]
pub struct TrafficMatrix {
    port_slots: usize,
    slots: usize,
    slot_time: u64,
    slot_idx: usize,
    totals: Vec<u64>,
    per_slot: Vec<u64>,
}

impl TrafficMatrix {
    pub fn new(port_slots: usize, epoch_time: u64, slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            port_slots,
            slots,
            slot_time: (epoch_time / slots as u64).max(1),
            slot_idx: 0,
            totals: vec![0; port_slots * port_slots],
            per_slot: vec![0; port_slots * port_slots * slots],
        }
    }

    fn pair(&self, from: PortIndex, to: PortIndex) -> usize {
        from.as_usize() * self.port_slots + to.as_usize()
    }

    fn rotate(&mut self, now: u64) {
        let slot = (now / self.slot_time % self.slots as u64) as usize;
        if slot == self.slot_idx {
            return;
        }
        self.slot_idx = slot;
        for pair in 0..self.totals.len() {
            let stale = &mut self.per_slot[pair * self.slots + slot];
            self.totals[pair] = self.totals[pair].saturating_sub(*stale);
            *stale = 0;
        }
    }

    pub fn record(&mut self, now: u64, from: PortIndex, to: PortIndex, bytes: u32) {
        self.rotate(now);
        let pair = self.pair(from, to);
        self.per_slot[pair * self.slots + self.slot_idx] += u64::from(bytes);
        self.totals[pair] += u64::from(bytes);
    }

    /// Recent bytes from `from` to `to`.
    pub fn bytes(&self, from: PortIndex, to: PortIndex) -> u64 {
        self.totals[self.pair(from, to)]
    }

    pub fn slot_index(&self) -> usize {
        self.slot_idx
    }
}

/// Bytes currently queued per (ingress, egress, queue).
#[derive(Debug, Clone)]
pub struct ByteMonitor {
    port_slots: usize,
    bytes: Vec<u64>,
}

impl ByteMonitor {
    pub fn new(port_slots: usize) -> Self {
        Self {
            port_slots,
            bytes: vec![0; port_slots * port_slots * QUEUE_COUNT],
        }
    }

    fn index(&self, from: PortIndex, to: PortIndex, queue: QueueIndex) -> usize {
        (from.as_usize() * self.port_slots + to.as_usize()) * QUEUE_COUNT + queue.as_usize()
    }

    pub fn add(&mut self, from: PortIndex, to: PortIndex, queue: QueueIndex, bytes: u32) {
        let idx = self.index(from, to, queue);
        self.bytes[idx] += u64::from(bytes);
    }

    pub fn remove(&mut self, from: PortIndex, to: PortIndex, queue: QueueIndex, bytes: u32) {
        let idx = self.index(from, to, queue);
        self.bytes[idx] = self.bytes[idx].saturating_sub(u64::from(bytes));
    }

    pub fn get(&self, from: PortIndex, to: PortIndex, queue: QueueIndex) -> u64 {
        self.bytes[self.index(from, to, queue)]
    }
}

/// Suppresses repeated signals for the same congestion event on a port.
#[derive(Debug, Clone)]
pub struct SignalDedup {
    window: u32,
    last: Vec<u32>,
}

impl SignalDedup {
    pub fn new(port_slots: usize, window: u32) -> Self {
        Self {
            window,
            last: vec![0; port_slots],
        }
    }

    /// Returns true (and remembers `event_id`) if a signal may go out on `port`.
    pub fn admit(&mut self, port: PortIndex, event_id: u32) -> bool {
        let last = &mut self.last[port.as_usize()];
        if *last == 0 || u64::from(event_id) > u64::from(*last) + u64::from(self.window) {
            *last = event_id;
            true
        } else {
            false
        }
    }

    pub fn last_event(&self, port: PortIndex) -> u32 {
        self.last[port.as_usize()]
    }
}
