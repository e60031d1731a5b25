//! Parsed packet as seen by the forwarding engine.

use crate::int_header::IntHeader;
use lossless_types::{EcnCodepoint, FiveTuple, Ipv4Address, L3Protocol, PortIndex};

/// Header fields the pipeline reads or rewrites, plus the ingress port tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub src_ip: Ipv4Address,
    pub dst_ip: Ipv4Address,
    pub protocol: L3Protocol,
    pub src_port: u16,
    pub dst_port: u16,
    /// Transport sequence number (TCP/UDP).
    pub seq: u32,
    /// Carried traffic class (priority group).
    pub pg: u16,
    pub ecn: EcnCodepoint,
    /// Event id of signal and polling packets.
    pub event_id: u32,
    /// Size on the wire in bytes.
    pub size: u32,
    /// Port the packet arrived on; set by the engine at receive.
    pub ingress_port: PortIndex,
    pub int_header: Option<IntHeader>,
}

impl Packet {
    fn new(src_ip: Ipv4Address, dst_ip: Ipv4Address, protocol: L3Protocol, size: u32) -> Self {
        Self {
            src_ip,
            dst_ip,
            protocol,
            src_port: 0,
            dst_port: 0,
            seq: 0,
            pg: 0,
            ecn: EcnCodepoint::NotEct,
            event_id: 0,
            size,
            ingress_port: PortIndex::new(0),
            int_header: None,
        }
    }

    /// RDMA data packet on priority group `pg`, ECN-capable, with an empty INT header.
    pub fn udp(
        src_ip: Ipv4Address,
        dst_ip: Ipv4Address,
        src_port: u16,
        dst_port: u16,
        pg: u16,
        seq: u32,
        size: u32,
    ) -> Self {
        Self {
            src_port,
            dst_port,
            pg,
            seq,
            ecn: EcnCodepoint::Ect0,
            int_header: Some(IntHeader::new()),
            ..Self::new(src_ip, dst_ip, L3Protocol::Udp, size)
        }
    }

    pub fn tcp(
        src_ip: Ipv4Address,
        dst_ip: Ipv4Address,
        src_port: u16,
        dst_port: u16,
        seq: u32,
        size: u32,
    ) -> Self {
        Self {
            src_port,
            dst_port,
            seq,
            ..Self::new(src_ip, dst_ip, L3Protocol::Tcp, size)
        }
    }

    /// Acknowledgement (or NACK) travelling back to the sender.
    pub fn ack(
        src_ip: Ipv4Address,
        dst_ip: Ipv4Address,
        src_port: u16,
        dst_port: u16,
        pg: u16,
        nack: bool,
        size: u32,
    ) -> Self {
        let protocol = if nack { L3Protocol::Nack } else { L3Protocol::Ack };
        Self {
            src_port,
            dst_port,
            pg,
            ..Self::new(src_ip, dst_ip, protocol, size)
        }
    }

    /// Path probe following a flow's ECMP path.
    pub fn polling(
        src_ip: Ipv4Address,
        dst_ip: Ipv4Address,
        src_port: u16,
        dst_port: u16,
        event_id: u32,
        size: u32,
    ) -> Self {
        Self {
            src_port,
            dst_port,
            event_id,
            ..Self::new(src_ip, dst_ip, L3Protocol::Polling, size)
        }
    }

    /// Hop-by-hop sustained-pause signal; consumed by every switch it reaches.
    pub fn signal(event_id: u32, size: u32) -> Self {
        Self {
            event_id,
            ..Self::new(
                Ipv4Address::UNSPECIFIED,
                Ipv4Address::UNSPECIFIED,
                L3Protocol::Signal,
                size,
            )
        }
    }

    /// Link-local control frame (PFC or QCN).
    pub fn control(protocol: L3Protocol, dst_ip: Ipv4Address, size: u32) -> Self {
        Self::new(Ipv4Address::UNSPECIFIED, dst_ip, protocol, size)
    }

    pub fn five_tuple(&self) -> FiveTuple {
        FiveTuple::new(
            self.src_ip,
            self.dst_ip,
            self.src_port,
            self.dst_port,
            self.protocol,
        )
    }

    /// 12-byte ECMP key: source, destination and `sport | dport << 16`, little-endian.
    pub fn ecmp_key(&self) -> [u8; 12] {
        let ports = if self.protocol.has_ports() {
            u32::from(self.src_port) | (u32::from(self.dst_port) << 16)
        } else {
            0
        };
        let mut key = [0u8; 12];
        key[0..4].copy_from_slice(&self.src_ip.to_bits().to_le_bytes());
        key[4..8].copy_from_slice(&self.dst_ip.to_bits().to_le_bytes());
        key[8..12].copy_from_slice(&ports.to_le_bytes());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(last: u8) -> Ipv4Address {
        Ipv4Address::new(10, 0, 0, last)
    }

    #[test]
    fn test_udp_packet_defaults() {
        let p = Packet::udp(addr(1), addr(2), 1000, 100, 3, 42, 1048);
        assert_eq!(p.protocol, L3Protocol::Udp);
        assert_eq!(p.ecn, EcnCodepoint::Ect0);
        assert!(p.int_header.is_some());
        assert_eq!(p.ingress_port, PortIndex::new(0));
    }

    #[test]
    fn test_ecmp_key_layout() {
        let p = Packet::udp(addr(1), addr(2), 0x1234, 0x5678, 3, 0, 64);
        let key = p.ecmp_key();
        assert_eq!(&key[0..4], &addr(1).to_bits().to_le_bytes());
        assert_eq!(&key[4..8], &addr(2).to_bits().to_le_bytes());
        assert_eq!(&key[8..12], &[0x34, 0x12, 0x78, 0x56]);
    }

    #[test]
    fn test_ecmp_key_ignores_ports_without_transport() {
        let mut p = Packet::control(L3Protocol::Qcn, addr(2), 64);
        p.src_port = 7;
        assert_eq!(&p.ecmp_key()[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_five_tuple() {
        let p = Packet::tcp(addr(1), addr(2), 5, 6, 0, 1500);
        let tuple = p.five_tuple();
        assert_eq!(tuple.src_ip, addr(1).to_bits());
        assert_eq!(tuple.dst_port, 6);
        assert_eq!(tuple.protocol, 0x06);
    }
}
