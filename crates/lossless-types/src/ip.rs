//! IPv4 address type with safe parsing.
//!
//! Addresses travel through the data path as host-order `u32` values (that is
//! what routing tables and hash keys are built from), so the wrapper keeps the
//! integer form cheap to get at.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 address wrapper with data-path utilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv4Address(Ipv4Addr);

impl Ipv4Address {
    pub const UNSPECIFIED: Self = Ipv4Address(Ipv4Addr::UNSPECIFIED);
    pub const BROADCAST: Self = Ipv4Address(Ipv4Addr::BROADCAST);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address(Ipv4Addr::new(a, b, c, d))
    }

    /// Builds an address from its host-order integer form.
    pub const fn from_bits(bits: u32) -> Self {
        Ipv4Address(Ipv4Addr::from_bits(bits))
    }

    /// Returns the host-order integer form.
    pub const fn to_bits(&self) -> u32 {
        self.0.to_bits()
    }

    pub const fn inner(&self) -> Ipv4Addr {
        self.0
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    /// Returns true for 0.0.0.0, which marks an unused telemetry slot.
    pub const fn is_unspecified(&self) -> bool {
        self.to_bits() == 0
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Eight-digit lowercase hex, the form used in telemetry reports.
impl fmt::LowerHex for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.to_bits(), f)
    }
}

impl FromStr for Ipv4Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Ipv4Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Ipv4Address(addr)
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        addr.0
    }
}

impl From<u32> for Ipv4Address {
    fn from(bits: u32) -> Self {
        Ipv4Address::from_bits(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_parse() {
        let addr: Ipv4Address = "11.0.0.1".parse().unwrap();
        assert_eq!(addr.octets(), [11, 0, 0, 1]);
        assert_eq!(addr.to_string(), "11.0.0.1");
    }

    #[test]
    fn test_ipv4_parse_invalid() {
        assert!("11.0.0".parse::<Ipv4Address>().is_err());
        assert!("not-an-ip".parse::<Ipv4Address>().is_err());
    }

    #[test]
    fn test_ipv4_bits_roundtrip() {
        let addr = Ipv4Address::new(11, 0, 1, 1);
        assert_eq!(addr.to_bits(), 0x0b00_0101);
        assert_eq!(Ipv4Address::from_bits(0x0b00_0101), addr);
    }

    #[test]
    fn test_ipv4_hex_format() {
        let addr = Ipv4Address::new(11, 0, 1, 1);
        assert_eq!(format!("{:08x}", addr), "0b000101");
    }

    #[test]
    fn test_unspecified() {
        assert!(Ipv4Address::UNSPECIFIED.is_unspecified());
        assert!(!Ipv4Address::new(10, 0, 0, 1).is_unspecified());
    }
}
