//! HPCC hop stamping and PINT utilization encoding at dequeue.

mod common;

use common::*;
use lossless_switch::int_header::MAX_HOPS;
use lossless_switch::{CcMode, ForwardingEngine, Packet, SwitchError, TelemetryWriter};
use pretty_assertions::assert_eq;

fn cc_config(mode: CcMode) -> lossless_switch::SwitchConfig {
    let mut config = roomy_config(2);
    config.cc_mode = mode;
    config
}

/// Send one packet through the switch and return it as transmitted.
fn forward(sw: &mut TestEngine, now: u64, packet: Packet) -> Packet {
    sw.receive(now, port(1), packet);
    drain(sw, now).pop().unwrap()
}

#[test]
fn test_hpcc_pushes_hop_per_traversal() {
    let mut sw = engine(&cc_config(CcMode::Hpcc));
    sw.add_route(host(2), port(2)).unwrap();
    sw.devices_mut().queue_bytes.insert(port(2), 8000);

    let packet = forward(&mut sw, 5_000, data(1, 2, 1, 0, 1000));
    let header = packet.int_header.unwrap();
    assert_eq!(header.hop_count(), 1);
    let hop = header.hops()[0];
    assert_eq!(hop.time(), 5_000);
    assert_eq!(hop.bytes(1), 0);
    assert_eq!(hop.qlen(1), 8000);
    assert_eq!(hop.line_rate(), GBPS_100);

    // Second pass sees the first packet in the tx byte counter
    let packet = forward(&mut sw, 7_000, packet);
    let hops = packet.int_header.unwrap();
    assert_eq!(hops.hop_count(), 2);
    assert_eq!(hops.hops()[1].bytes(1), 7 * 128);
    assert_eq!(hops.hops()[1].time_delta(&hops.hops()[0]), 2_000);
}

#[test]
fn test_hpcc_hop_limit() {
    let mut sw = engine(&cc_config(CcMode::Hpcc));
    sw.add_route(host(2), port(2)).unwrap();
    let mut packet = data(1, 2, 1, 0, 1000);
    for i in 0..(MAX_HOPS as u64 + 2) {
        packet = forward(&mut sw, 1_000 * (i + 1), packet);
    }
    let header = packet.int_header.unwrap();
    assert_eq!(header.hop_count(), MAX_HOPS);
    assert_eq!(header.hops()[MAX_HOPS - 1].time(), 1_000 * MAX_HOPS as u64);
}

#[test]
fn test_hpcc_rejects_unencodable_line_rate() {
    let mut devices = MockDevices::default();
    devices.rates.insert(port(2), 40_000_000_000);
    let result = ForwardingEngine::new(
        &cc_config(CcMode::Hpcc),
        devices,
        TelemetryWriter::new(Vec::new()),
    );
    assert!(matches!(
        result,
        Err(SwitchError::UnsupportedLineRate { rate: 40_000_000_000, .. })
    ));

    // Down links are not checked
    let mut devices = MockDevices::default();
    devices.rates.insert(port(2), 40_000_000_000);
    devices.down.insert(port(2));
    let result = ForwardingEngine::new(
        &cc_config(CcMode::Hpcc),
        devices,
        TelemetryWriter::new(Vec::new()),
    );
    assert!(result.is_ok());
}

#[test]
fn test_pint_tracks_line_rate_utilization() {
    let mut sw = engine(&cc_config(CcMode::Pint));
    sw.add_route(host(2), port(2)).unwrap();

    // 1000 bytes every 80 ns is exactly 100 Gbps
    let mut last = None;
    for i in 1..=400u32 {
        last = Some(forward(&mut sw, u64::from(i) * 80, data(1, 2, 1, i, 1000)));
    }
    let u = sw.port_utilization(port(2)).u;
    assert!(u > 0.9 && u < 1.1, "u = {}", u);

    let power = last.unwrap().int_header.unwrap().power();
    assert_eq!(power, sw.pint_codec().encode_u(u));
    let decoded = sw.pint_codec().decode_u(power);
    assert!((decoded / u - 1.0).abs() < 0.03);
}

#[test]
fn test_pint_keeps_larger_carried_power() {
    let mut sw = engine(&cc_config(CcMode::Pint));
    sw.add_route(host(2), port(2)).unwrap();
    let mut packet = data(1, 2, 1, 0, 1000);
    if let Some(header) = packet.int_header.as_mut() {
        header.set_power(500);
    }
    let packet = forward(&mut sw, 100, packet);
    assert_eq!(packet.int_header.unwrap().power(), 500);
}

#[test]
fn test_no_stamping_without_cc_mode() {
    let mut sw = engine(&cc_config(CcMode::None));
    sw.add_route(host(2), port(2)).unwrap();
    let packet = forward(&mut sw, 100, data(1, 2, 1, 0, 1000));
    let header = packet.int_header.unwrap();
    assert_eq!(header.hop_count(), 0);
    assert_eq!(header.power(), 0);
    assert_eq!(sw.port_utilization(port(2)).last_pkt_ts, 100);
}

#[test]
fn test_tcp_is_never_stamped() {
    let mut sw = engine(&cc_config(CcMode::Hpcc));
    sw.add_route(host(2), port(2)).unwrap();
    let mut tcp = Packet::tcp(host(1), host(2), 1, 2, 0, 1500);
    tcp.int_header = Some(Default::default());
    let packet = forward(&mut sw, 100, tcp);
    assert_eq!(packet.int_header.unwrap().hop_count(), 0);
    assert_eq!(sw.port_utilization(port(2)).tx_bytes, 1500);
}
