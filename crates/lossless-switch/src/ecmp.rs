//! Routing table and ECMP next-hop selection.
//!
//! The table is built externally (bulk [`RoutingTable::add_route`] calls after
//! every topology change) and only read on the packet path.

use lossless_types::{Ipv4Address, PortIndex};
use std::collections::HashMap;

/// Seed of the flow-telemetry bucket hash.
pub const FLOW_HASH_SEED: u32 = 0x233;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

fn scramble(k: u32) -> u32 {
    k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

/// 32-bit MurmurHash3 (x86 variant) over `key`.
pub fn murmur3_32(key: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let mut chunks = key.chunks_exact(4);
    for chunk in &mut chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h ^= scramble(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let k = tail
            .iter()
            .rev()
            .fold(0u32, |k, &byte| (k << 8) | u32::from(byte));
        h ^= scramble(k);
    }

    h ^= key.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Destination address -> ordered ECMP candidate ports.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<Ipv4Address, Vec<PortIndex>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `port` to the candidate list for `dst`.
    pub fn add_route(&mut self, dst: Ipv4Address, port: PortIndex) {
        self.routes.entry(dst).or_default().push(port);
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    pub fn next_hops(&self, dst: &Ipv4Address) -> Option<&[PortIndex]> {
        self.routes.get(dst).map(Vec::as_slice)
    }

    /// Number of destinations.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Pick the candidate for `dst` selected by `hash(key, seed) mod count`.
    pub fn select(&self, dst: &Ipv4Address, key: &[u8], seed: u32) -> Option<PortIndex> {
        let hops = self.next_hops(dst)?;
        if hops.is_empty() {
            return None;
        }
        let idx = murmur3_32(key, seed) as usize % hops.len();
        Some(hops[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_murmur3_reference_vectors() {
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514e_28b7);
        assert_eq!(murmur3_32(b"", 0xffff_ffff), 0x81f1_6f39);
        assert_eq!(murmur3_32(&[0, 0, 0, 0], 0), 0x2362_f9de);
        assert_eq!(murmur3_32(&[0x21, 0x43, 0x65, 0x87], 0), 0xf55b_516b);
        assert_eq!(murmur3_32(&[0x21, 0x43, 0x65], 0), 0x7e4a_8634);
        assert_eq!(murmur3_32(&[0x21, 0x43], 0), 0xa0f7_b07a);
        assert_eq!(murmur3_32(&[0x21], 0), 0x7266_1cf4);
    }

    #[test]
    fn test_route_add_and_clear() {
        let mut table = RoutingTable::new();
        let dst = Ipv4Address::new(10, 0, 1, 1);
        table.add_route(dst, PortIndex::new(1));
        table.add_route(dst, PortIndex::new(2));
        assert_eq!(
            table.next_hops(&dst),
            Some(&[PortIndex::new(1), PortIndex::new(2)][..])
        );
        assert_eq!(table.len(), 1);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.select(&dst, &[0; 12], 0), None);
    }

    #[test]
    fn test_single_candidate_always_selected() {
        let mut table = RoutingTable::new();
        let dst = Ipv4Address::new(10, 0, 1, 1);
        table.add_route(dst, PortIndex::new(3));
        for seed in 0..50 {
            assert_eq!(table.select(&dst, &[seed as u8; 12], seed), Some(PortIndex::new(3)));
        }
    }
}
