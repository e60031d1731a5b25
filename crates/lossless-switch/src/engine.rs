//! Forwarding engine
//!
//! Drives one switch through two events: packet arrival ([`ForwardingEngine::receive`])
//! and transmit selection ([`ForwardingEngine::notify_dequeue`]). Both run to
//! completion and never fail; anything that cannot be forwarded is dropped.
//!
//! Arrival: route and ECMP-select the egress port, classify the priority,
//! run MMU admission for non-control queues, raise PFC pause if needed, and
//! update the traffic matrix and telemetry tables before enqueueing.
//!
//! Dequeue: release MMU accounting, ECN-mark, raise PFC resume if needed, and
//! stamp HPCC or PINT telemetry into UDP packets.

use crate::config::{CcMode, SwitchConfig};
use crate::device::{PfcAction, SwitchDevices};
use crate::ecmp::RoutingTable;
use crate::error::{SwitchError, SwitchResult};
use crate::int_header::{line_rate_code, IntHeader, IntHop};
use crate::packet::Packet;
use crate::pint::{estimate_utilization, PintCodec, PortUtilization};
use crate::report::{ReportKind, TelemetryWriter, TrafficMeter};
use crate::telemetry::{
    ByteMonitor, EnqueueSample, EpochClock, SignalDedup, TelemetryTables, TrafficMatrix,
};
use lossless_mmu::SwitchMmu;
use lossless_types::{EcnCodepoint, Ipv4Address, L3Protocol, PortIndex, QueueIndex, CONTROL_QUEUE};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, Write};
use tracing::{debug, info, trace, warn};

/// Queue used for reliable-transport traffic.
const TCP_QUEUE: QueueIndex = QueueIndex::from_traffic_class(1);

/// Packet counters of one engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingStats {
    pub forwarded: u64,
    pub dropped_no_route: u64,
    pub dropped_link_down: u64,
    pub dropped_admission: u64,
    pub dropped_unknown_port: u64,
    pub pfc_pauses_sent: u64,
    pub pfc_resumes_sent: u64,
    pub ecn_marked: u64,
    pub signals_sent: u64,
    pub signals_suppressed: u64,
}

/// Priority queue for a packet.
///
/// Control protocols go to queue 0, TCP to queue 1, everything else to its
/// carried traffic class.
pub fn classify(packet: &Packet, ack_high_prio: bool) -> QueueIndex {
    match packet.protocol {
        L3Protocol::Polling | L3Protocol::Pfc | L3Protocol::Qcn => CONTROL_QUEUE,
        L3Protocol::Ack | L3Protocol::Nack if ack_high_prio => CONTROL_QUEUE,
        L3Protocol::Tcp => TCP_QUEUE,
        _ => QueueIndex::from_traffic_class(packet.pg),
    }
}

fn port_at(idx: usize) -> PortIndex {
    PortIndex::new(idx as u32)
}

fn log_report_error(result: io::Result<()>) {
    if let Err(e) = result {
        warn!("Failed to write telemetry report: {}", e);
    }
}

pub struct ForwardingEngine<D: SwitchDevices, W: Write> {
    node_id: u32,
    ecmp_seed: u32,
    ecn_enabled: bool,
    ack_high_prio: bool,
    cc_mode: CcMode,
    max_rtt: u64,
    int_multi: u32,
    pause_watch_queue: QueueIndex,

    mmu: SwitchMmu,
    devices: D,
    routes: RoutingTable,

    telemetry: TelemetryTables,
    traffic: TrafficMatrix,
    queued: ByteMonitor,
    utilization: Vec<PortUtilization>,
    signals: SignalDedup,
    pint: PintCodec,
    rng: StdRng,
    reports: TelemetryWriter<W>,

    stats: ForwardingStats,
}

impl<D: SwitchDevices, W: Write> ForwardingEngine<D, W> {
    /// Build a switch. All tables are sized here from `config`.
    pub fn new(config: &SwitchConfig, devices: D, reports: TelemetryWriter<W>) -> SwitchResult<Self> {
        config.validate()?;
        let mmu = SwitchMmu::new(config.node_id, &config.mmu)?;
        let port_slots = mmu.port_count() + 1;

        if config.cc_mode == CcMode::Hpcc {
            for port in (1..port_slots).map(port_at) {
                if !devices.is_link_up(port) {
                    continue;
                }
                let rate = devices.bit_rate(port);
                if line_rate_code(rate).is_none() {
                    return Err(SwitchError::UnsupportedLineRate { port, rate });
                }
            }
        }

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let clock = EpochClock::new(config.epoch_time);

        info!(
            "Switch {} forwarding engine ready: {} ports, cc_mode={:?}, ecn={}, {} flow buckets",
            config.node_id,
            mmu.port_count(),
            config.cc_mode,
            config.ecn_enabled,
            config.flow_entries
        );

        Ok(Self {
            node_id: config.node_id,
            ecmp_seed: config.effective_ecmp_seed(),
            ecn_enabled: config.ecn_enabled,
            ack_high_prio: config.ack_high_prio,
            cc_mode: config.cc_mode,
            max_rtt: config.max_rtt,
            int_multi: config.int_multi,
            pause_watch_queue: config.pause_watch_queue,
            mmu,
            devices,
            routes: RoutingTable::new(),
            telemetry: TelemetryTables::new(port_slots, config.flow_entries, clock),
            traffic: TrafficMatrix::new(port_slots, config.epoch_time, config.traffic_matrix_slots),
            queued: ByteMonitor::new(port_slots),
            utilization: vec![PortUtilization::default(); port_slots],
            signals: SignalDedup::new(port_slots, config.signal_dedup_window),
            pint: PintCodec::new(config.pint_log_base)?,
            rng,
            reports,
            stats: ForwardingStats::default(),
        })
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn set_ecmp_seed(&mut self, seed: u32) {
        self.ecmp_seed = seed;
    }

    /// Add `port` as an ECMP candidate towards `dst`.
    pub fn add_route(&mut self, dst: Ipv4Address, port: PortIndex) -> SwitchResult<()> {
        if port.value() == 0 || port.as_usize() > self.mmu.port_count() {
            return Err(SwitchError::PortOutOfRange {
                port,
                port_count: self.mmu.port_count(),
            });
        }
        self.routes.add_route(dst, port);
        Ok(())
    }

    pub fn clear_routes(&mut self) {
        self.routes.clear();
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn mmu(&self) -> &SwitchMmu {
        &self.mmu
    }

    pub fn devices(&self) -> &D {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut D {
        &mut self.devices
    }

    pub fn telemetry(&self) -> &TelemetryTables {
        &self.telemetry
    }

    pub fn traffic_matrix(&self) -> &TrafficMatrix {
        &self.traffic
    }

    /// Bytes from `from` queued on `to` at `queue` and not yet dequeued.
    pub fn queued_bytes(&self, from: PortIndex, to: PortIndex, queue: QueueIndex) -> u64 {
        self.queued.get(from, to, queue)
    }

    pub fn port_utilization(&self, port: PortIndex) -> &PortUtilization {
        &self.utilization[port.as_usize()]
    }

    pub fn pint_codec(&self) -> &PintCodec {
        &self.pint
    }

    pub fn stats(&self) -> &ForwardingStats {
        &self.stats
    }

    pub fn reports(&self) -> &TelemetryWriter<W> {
        &self.reports
    }

    pub fn flush_reports(&mut self) -> SwitchResult<()> {
        self.reports.flush()?;
        Ok(())
    }

    /// Egress port ECMP would choose for this packet, if routable.
    pub fn select_egress(&self, packet: &Packet) -> Option<PortIndex> {
        self.routes
            .select(&packet.dst_ip, &packet.ecmp_key(), self.ecmp_seed)
    }

    /// Handle a packet arriving on `in_port` at virtual time `now` (ns).
    pub fn receive(&mut self, now: u64, in_port: PortIndex, mut packet: Packet) {
        if !self.mmu.has_port(in_port) {
            debug!("Switch {} drop: unknown ingress port {}", self.node_id, in_port);
            self.stats.dropped_unknown_port += 1;
            return;
        }
        packet.ingress_port = in_port;

        match packet.protocol {
            L3Protocol::Signal => {
                self.handle_signal(now, in_port, packet.event_id);
                return;
            }
            L3Protocol::Polling => self.handle_polling(now, in_port, &packet),
            _ => {}
        }

        let out = match self.select_egress(&packet) {
            Some(port) => port,
            None => {
                trace!("Switch {} drop: no route to {}", self.node_id, packet.dst_ip);
                self.stats.dropped_no_route += 1;
                return;
            }
        };
        if !self.devices.is_link_up(out) {
            debug!("Switch {} drop: route to {} uses down port {}", self.node_id, packet.dst_ip, out);
            self.stats.dropped_link_down += 1;
            return;
        }

        let queue = classify(&packet, self.ack_high_prio);
        if !queue.is_control() {
            let size = packet.size;
            if !(self.mmu.check_ingress_admission(in_port, queue, size)
                && self.mmu.check_egress_admission(out, queue, size))
            {
                self.stats.dropped_admission += 1;
                return;
            }
            self.mmu.update_ingress_admission(in_port, queue, size);
            self.mmu.update_egress_admission(out, queue, size);
            self.check_and_send_pause(in_port, queue);

            self.traffic.record(now, in_port, out, size);
            let sample = EnqueueSample {
                queue_length: self.mmu.counters(out, queue).egress_queue_length,
                paused: self.devices.egress_paused(out, queue),
            };
            self.telemetry
                .record(now, out, packet.five_tuple(), packet.seq, sample);
            self.queued.add(in_port, out, queue, size);
        }

        trace!(
            "Switch {} forward {} {} -> port {} queue {}",
            self.node_id,
            packet.protocol,
            packet.dst_ip,
            out,
            queue
        );
        self.stats.forwarded += 1;
        self.devices.enqueue(out, queue, packet);
    }

    /// Handle a packet selected for transmission on `port`.
    ///
    /// May rewrite the ECN field and the INT header in place.
    pub fn notify_dequeue(&mut self, now: u64, port: PortIndex, queue: QueueIndex, packet: &mut Packet) {
        if !self.mmu.has_port(port) {
            warn!("Switch {} dequeue on unknown port {}", self.node_id, port);
            return;
        }

        if !queue.is_control() {
            let in_port = packet.ingress_port;
            let size = packet.size;
            self.mmu.remove_from_ingress_admission(in_port, queue, size);
            self.mmu.remove_from_egress_admission(port, queue, size);
            self.queued.remove(in_port, port, queue, size);

            if self.ecn_enabled && self.mmu.should_send_cn(port, queue, &mut self.rng) {
                packet.ecn = EcnCodepoint::Ce;
                self.stats.ecn_marked += 1;
            }
            self.check_and_send_resume(in_port, queue);
        }

        if packet.protocol == L3Protocol::Udp {
            if let Some(header) = packet.int_header.as_mut() {
                self.stamp_int(now, port, header);
            }
        }

        self.utilization[port.as_usize()].on_transmit(now, packet.size);
    }

    fn check_and_send_pause(&mut self, port: PortIndex, queue: QueueIndex) {
        if self.mmu.check_should_pause(port, queue) {
            self.devices.send_pfc(port, queue, PfcAction::Pause);
            self.mmu.set_pause(port, queue);
            self.stats.pfc_pauses_sent += 1;
            debug!("Switch {} port {} sent PFC pause for queue {}", self.node_id, port, queue);
        }
    }

    fn check_and_send_resume(&mut self, port: PortIndex, queue: QueueIndex) {
        if self.mmu.check_should_resume(port, queue) {
            self.devices.send_pfc(port, queue, PfcAction::Resume);
            self.mmu.set_resume(port, queue);
            self.stats.pfc_resumes_sent += 1;
            debug!("Switch {} port {} sent PFC resume for queue {}", self.node_id, port, queue);
        }
    }

    fn stamp_int(&mut self, now: u64, port: PortIndex, header: &mut IntHeader) {
        let idx = port.as_usize();
        match self.cc_mode {
            CcMode::None => {}
            CcMode::Hpcc => {
                let rate = self.devices.bit_rate(port);
                let hop = IntHop::new(
                    now,
                    self.utilization[idx].tx_bytes,
                    self.devices.queue_bytes(port),
                    rate,
                    self.int_multi,
                );
                match hop {
                    Some(hop) => {
                        if !header.push_hop(hop) {
                            trace!("Switch {} INT header full, hop not recorded", self.node_id);
                        }
                    }
                    None => debug!(
                        "Switch {} port {} rate {} has no INT line-rate code",
                        self.node_id, port, rate
                    ),
                }
            }
            CcMode::Pint => {
                let u = estimate_utilization(
                    &self.utilization[idx],
                    now,
                    self.max_rtt,
                    self.devices.bit_rate(port),
                    self.devices.queue_bytes(port),
                    &mut self.rng,
                );
                header.raise_power(self.pint.encode_u(u));
                self.utilization[idx].u = u;
            }
        }
    }

    /// Pause seen in recent telemetry or currently asserted on the watched queue.
    fn pause_sustained(&self, now: u64, port: PortIndex) -> bool {
        self.telemetry.paused_recently(now, port)
            || self.devices.egress_paused(port, self.pause_watch_queue)
    }

    fn forward_signal(&mut self, port: PortIndex, event_id: u32) {
        if self.signals.admit(port, event_id) {
            debug!("Switch {} signal {} -> port {}", self.node_id, event_id, port);
            self.stats.signals_sent += 1;
            self.devices.send_signal(port, event_id);
        } else {
            self.stats.signals_suppressed += 1;
        }
    }

    /// Report every egress fed by `in_port` and push the signal on towards paused ones.
    fn handle_signal(&mut self, now: u64, in_port: PortIndex, event_id: u32) {
        log_report_error(self.reports.begin(now, ReportKind::Signal));
        for port in (0..self.mmu.port_count() + 1).map(port_at) {
            let bytes = self.traffic.bytes(in_port, port);
            if bytes == 0 {
                continue;
            }
            let meter = TrafficMeter {
                from: in_port,
                bytes,
            };
            log_report_error(self.reports.port_block(now, port, Some(meter), &self.telemetry));
            if self.pause_sustained(now, port) {
                self.forward_signal(port, event_id);
            }
        }
        log_report_error(self.reports.end());
    }

    /// Signal downstream if the probe's egress is paused, then report that egress.
    fn handle_polling(&mut self, now: u64, in_port: PortIndex, packet: &Packet) {
        let out = match self.select_egress(packet) {
            Some(port) => port,
            None => return,
        };
        trace!("Switch {} polling from port {} via port {}", self.node_id, in_port, out);
        if self.pause_sustained(now, out) {
            self.forward_signal(out, packet.event_id);
        }
        let written = self
            .reports
            .begin(now, ReportKind::Polling)
            .and_then(|()| self.reports.port_block(now, out, None, &self.telemetry))
            .and_then(|()| self.reports.end());
        log_report_error(written);
    }
}
