//! Flow identification and header field types.

use crate::{Ipv4Address, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IPv4 protocol number, including the simulator's in-band control protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum L3Protocol {
    /// Reliable transport (0x06).
    Tcp,
    /// RDMA data over UDP (0x11).
    Udp,
    /// Path polling probe (0xFA).
    Polling,
    /// Sustained-pause signal (0xFB).
    Signal,
    /// Positive acknowledgement (0xFC).
    Ack,
    /// Negative acknowledgement (0xFD).
    Nack,
    /// Priority flow control frame (0xFE).
    Pfc,
    /// Congestion notification (0xFF).
    Qcn,
    /// Anything else.
    Other(u8),
}

impl L3Protocol {
    pub const fn number(&self) -> u8 {
        match self {
            L3Protocol::Tcp => 0x06,
            L3Protocol::Udp => 0x11,
            L3Protocol::Polling => 0xFA,
            L3Protocol::Signal => 0xFB,
            L3Protocol::Ack => 0xFC,
            L3Protocol::Nack => 0xFD,
            L3Protocol::Pfc => 0xFE,
            L3Protocol::Qcn => 0xFF,
            L3Protocol::Other(n) => *n,
        }
    }

    /// Returns true for acknowledgements that may be promoted to the control queue.
    pub const fn is_ack(&self) -> bool {
        matches!(self, L3Protocol::Ack | L3Protocol::Nack)
    }

    /// Returns true if the header carries a transport port pair usable for ECMP.
    pub const fn has_ports(&self) -> bool {
        matches!(
            self,
            L3Protocol::Tcp
                | L3Protocol::Udp
                | L3Protocol::Ack
                | L3Protocol::Nack
                | L3Protocol::Polling
        )
    }
}

impl From<u8> for L3Protocol {
    fn from(number: u8) -> Self {
        match number {
            0x06 => L3Protocol::Tcp,
            0x11 => L3Protocol::Udp,
            0xFA => L3Protocol::Polling,
            0xFB => L3Protocol::Signal,
            0xFC => L3Protocol::Ack,
            0xFD => L3Protocol::Nack,
            0xFE => L3Protocol::Pfc,
            0xFF => L3Protocol::Qcn,
            n => L3Protocol::Other(n),
        }
    }
}

impl fmt::Display for L3Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            L3Protocol::Tcp => write!(f, "tcp"),
            L3Protocol::Udp => write!(f, "udp"),
            L3Protocol::Polling => write!(f, "polling"),
            L3Protocol::Signal => write!(f, "signal"),
            L3Protocol::Ack => write!(f, "ack"),
            L3Protocol::Nack => write!(f, "nack"),
            L3Protocol::Pfc => write!(f, "pfc"),
            L3Protocol::Qcn => write!(f, "qcn"),
            L3Protocol::Other(n) => write!(f, "{:#04x}", n),
        }
    }
}

impl FromStr for L3Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(L3Protocol::Tcp),
            "udp" => Ok(L3Protocol::Udp),
            "polling" => Ok(L3Protocol::Polling),
            "signal" => Ok(L3Protocol::Signal),
            "ack" => Ok(L3Protocol::Ack),
            "nack" => Ok(L3Protocol::Nack),
            "pfc" => Ok(L3Protocol::Pfc),
            "qcn" => Ok(L3Protocol::Qcn),
            other => other
                .parse::<u8>()
                .map(L3Protocol::from)
                .map_err(|_| ParseError::InvalidProtocol(s.to_string())),
        }
    }
}

/// ECN field of the IPv4 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EcnCodepoint {
    #[default]
    NotEct,
    Ect1,
    Ect0,
    /// Congestion experienced (0b11).
    Ce,
}

impl EcnCodepoint {
    pub const fn bits(&self) -> u8 {
        match self {
            EcnCodepoint::NotEct => 0b00,
            EcnCodepoint::Ect1 => 0b01,
            EcnCodepoint::Ect0 => 0b10,
            EcnCodepoint::Ce => 0b11,
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => EcnCodepoint::NotEct,
            0b01 => EcnCodepoint::Ect1,
            0b10 => EcnCodepoint::Ect0,
            _ => EcnCodepoint::Ce,
        }
    }

    pub const fn is_congestion_experienced(&self) -> bool {
        matches!(self, EcnCodepoint::Ce)
    }
}

/// Flow identifier: (srcIp, dstIp, srcPort, dstPort, protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FiveTuple {
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
}

impl FiveTuple {
    /// Size of the hash key, laid out like a naturally aligned C struct.
    pub const KEY_LEN: usize = 16;

    pub fn new(
        src_ip: Ipv4Address,
        dst_ip: Ipv4Address,
        src_port: u16,
        dst_port: u16,
        protocol: L3Protocol,
    ) -> Self {
        Self {
            src_ip: src_ip.to_bits(),
            dst_ip: dst_ip.to_bits(),
            src_port,
            dst_port,
            protocol: protocol.number(),
        }
    }

    /// Key bytes for flow-table hashing.
    ///
    /// Little-endian fields followed by three zeroed padding bytes.
    pub fn hash_key(&self) -> [u8; Self::KEY_LEN] {
        let mut key = [0u8; Self::KEY_LEN];
        key[0..4].copy_from_slice(&self.src_ip.to_le_bytes());
        key[4..8].copy_from_slice(&self.dst_ip.to_le_bytes());
        key[8..10].copy_from_slice(&self.src_port.to_le_bytes());
        key[10..12].copy_from_slice(&self.dst_port.to_le_bytes());
        key[12] = self.protocol;
        key
    }

    /// Returns true for the all-zero tuple of a never-written table slot.
    pub fn is_empty(&self) -> bool {
        self.src_ip == 0
    }
}

impl fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} ({})",
            Ipv4Address::from_bits(self.src_ip),
            self.src_port,
            Ipv4Address::from_bits(self.dst_ip),
            self.dst_port,
            L3Protocol::from(self.protocol)
        )
    }
}
