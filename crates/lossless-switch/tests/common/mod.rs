//! Shared fixtures for forwarding-engine integration tests.

#![allow(dead_code)]

use lossless_mmu::{EcnConfig, MmuConfig, PortBufferConfig};
use lossless_switch::{ForwardingEngine, Packet, PfcAction, SwitchConfig, SwitchDevices};
use lossless_types::{Ipv4Address, PortIndex, QueueIndex};
use std::collections::{HashMap, HashSet};
use tracing_subscriber::EnvFilter;

pub const GBPS_100: u64 = 100_000_000_000;
pub const EPOCH: u64 = 1_000_000;

/// Mock port devices recording everything the engine emits.
#[derive(Debug, Default)]
pub struct MockDevices {
    pub rates: HashMap<PortIndex, u64>,
    pub queue_bytes: HashMap<PortIndex, u64>,
    pub down: HashSet<PortIndex>,
    pub paused: HashSet<(PortIndex, QueueIndex)>,
    pub pfc: Vec<(PortIndex, QueueIndex, PfcAction)>,
    pub enqueued: Vec<(PortIndex, QueueIndex, Packet)>,
    pub signals: Vec<(PortIndex, u32)>,
}

impl SwitchDevices for MockDevices {
    fn bit_rate(&self, port: PortIndex) -> u64 {
        self.rates.get(&port).copied().unwrap_or(GBPS_100)
    }

    fn queue_bytes(&self, port: PortIndex) -> u64 {
        self.queue_bytes.get(&port).copied().unwrap_or(0)
    }

    fn is_link_up(&self, port: PortIndex) -> bool {
        !self.down.contains(&port)
    }

    fn egress_paused(&self, port: PortIndex, queue: QueueIndex) -> bool {
        self.paused.contains(&(port, queue))
    }

    fn send_pfc(&mut self, port: PortIndex, queue: QueueIndex, action: PfcAction) {
        self.pfc.push((port, queue, action));
    }

    fn enqueue(&mut self, port: PortIndex, queue: QueueIndex, packet: Packet) {
        self.enqueued.push((port, queue, packet));
    }

    fn send_signal(&mut self, port: PortIndex, event_id: u32) {
        self.signals.push((port, event_id));
    }
}

pub type TestEngine = ForwardingEngine<MockDevices, Vec<u8>>;

pub fn port(i: u32) -> PortIndex {
    PortIndex::new(i)
}

pub fn queue(q: u8) -> QueueIndex {
    QueueIndex::new(q).unwrap()
}

pub fn host(i: u8) -> Ipv4Address {
    Ipv4Address::new(11, 0, 0, i)
}

/// `ports` data ports with a large buffer, so nothing is dropped or paused.
pub fn roomy_config(ports: usize) -> SwitchConfig {
    SwitchConfig {
        node_id: 7,
        rng_seed: Some(1),
        mmu: MmuConfig {
            buffer_size: 32 * 1024 * 1024,
            reserve: 4096,
            resume_offset: 3072,
            ports: (0..ports)
                .map(|_| PortBufferConfig {
                    headroom: 100_000,
                    ecn: EcnConfig {
                        kmin: 100_000,
                        kmax: 400_000,
                        pmax: 0.2,
                    },
                    ..Default::default()
                })
                .collect(),
        },
        ..Default::default()
    }
}

/// Route engine logs through the test harness writer. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn engine(config: &SwitchConfig) -> TestEngine {
    init_tracing();
    ForwardingEngine::new(config, MockDevices::default(), lossless_switch::TelemetryWriter::new(Vec::new()))
        .unwrap()
}

/// Everything written to the report sink so far.
pub fn report_text(engine: &TestEngine) -> String {
    String::from_utf8(engine.reports().get_ref().clone()).unwrap()
}

/// Data packet from host `src` to host `dst` on priority group 3.
pub fn data(src: u8, dst: u8, sport: u16, seq: u32, size: u32) -> Packet {
    Packet::udp(host(src), host(dst), sport, 100, 3, seq, size)
}

/// Dequeue everything the engine has enqueued so far, in order, and return the packets.
pub fn drain(engine: &mut TestEngine, now: u64) -> Vec<Packet> {
    let pending = std::mem::take(&mut engine.devices_mut().enqueued);
    pending
        .into_iter()
        .map(|(p, q, mut packet)| {
            engine.notify_dequeue(now, p, q, &mut packet);
            packet
        })
        .collect()
}
