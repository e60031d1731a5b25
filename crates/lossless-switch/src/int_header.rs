//! In-band network telemetry header carried by UDP data packets.
//!
//! HPCC switches append one [`IntHop`] per hop; PINT switches only raise the
//! shared `power` field. Field widths match the on-wire bit layout, so values
//! wrap the way the hardware registers do.

/// Maximum hop records per header.
pub const MAX_HOPS: usize = 5;

pub const TIME_WIDTH: u32 = 24;
pub const BYTES_WIDTH: u32 = 20;
pub const QLEN_WIDTH: u32 = 17;

/// Byte counter unit, before the `multi` scale.
pub const BYTE_UNIT: u64 = 128;
/// Queue length unit, before the `multi` scale.
pub const QLEN_UNIT: u64 = 80;

/// Link rates a hop record can describe, indexed by line-rate code.
pub const LINE_RATES: [u64; 5] = [
    25_000_000_000,
    50_000_000_000,
    100_000_000_000,
    200_000_000_000,
    400_000_000_000,
];

const fn mask(width: u32) -> u64 {
    (1 << width) - 1
}

/// Line-rate code for a link bit-rate, if representable.
pub fn line_rate_code(rate_bps: u64) -> Option<u8> {
    LINE_RATES
        .iter()
        .position(|&r| r == rate_bps)
        .map(|code| code as u8)
}

/// One switch's record: timestamp, cumulative tx bytes, queue length, link rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntHop {
    time: u32,
    bytes: u32,
    qlen: u32,
    line_rate: u8,
}

impl IntHop {
    /// Build a hop record, truncating each value to its field width.
    pub fn new(time: u64, tx_bytes: u64, qlen: u64, rate_bps: u64, multi: u32) -> Option<Self> {
        let line_rate = line_rate_code(rate_bps)?;
        let multi = u64::from(multi.max(1));
        Some(Self {
            time: (time & mask(TIME_WIDTH)) as u32,
            bytes: ((tx_bytes / (BYTE_UNIT * multi)) & mask(BYTES_WIDTH)) as u32,
            qlen: ((qlen / (QLEN_UNIT * multi)) & mask(QLEN_WIDTH)) as u32,
            line_rate,
        })
    }

    /// Timestamp modulo 2^24 ns.
    pub fn time(&self) -> u64 {
        u64::from(self.time)
    }

    pub fn bytes(&self, multi: u32) -> u64 {
        u64::from(self.bytes) * BYTE_UNIT * u64::from(multi.max(1))
    }

    pub fn qlen(&self, multi: u32) -> u64 {
        u64::from(self.qlen) * QLEN_UNIT * u64::from(multi.max(1))
    }

    pub fn line_rate(&self) -> u64 {
        LINE_RATES[usize::from(self.line_rate)]
    }

    /// Bytes sent between `earlier` and this record, across counter wrap.
    pub fn bytes_delta(&self, earlier: &IntHop, multi: u32) -> u64 {
        let delta = (u64::from(self.bytes) + (1 << BYTES_WIDTH) - u64::from(earlier.bytes))
            & mask(BYTES_WIDTH);
        delta * BYTE_UNIT * u64::from(multi.max(1))
    }

    /// Nanoseconds between `earlier` and this record, across timestamp wrap.
    pub fn time_delta(&self, earlier: &IntHop) -> u64 {
        (u64::from(self.time) + (1 << TIME_WIDTH) - u64::from(earlier.time)) & mask(TIME_WIDTH)
    }
}

/// Telemetry header of one packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntHeader {
    hops: [IntHop; MAX_HOPS],
    nhop: u16,
    power: u16,
}

impl IntHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded hops, oldest first.
    pub fn hops(&self) -> &[IntHop] {
        &self.hops[..usize::from(self.nhop)]
    }

    pub fn hop_count(&self) -> usize {
        usize::from(self.nhop)
    }

    /// Append a hop record; ignored once [`MAX_HOPS`] are present.
    pub fn push_hop(&mut self, hop: IntHop) -> bool {
        let n = usize::from(self.nhop);
        if n >= MAX_HOPS {
            return false;
        }
        self.hops[n] = hop;
        self.nhop += 1;
        true
    }

    /// Encoded utilization of the most loaded hop so far.
    pub fn power(&self) -> u16 {
        self.power
    }

    pub fn set_power(&mut self, power: u16) {
        self.power = power;
    }

    /// Keep the larger of the carried and the offered code.
    pub fn raise_power(&mut self, power: u16) {
        self.power = self.power.max(power);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_rate_codes() {
        assert_eq!(line_rate_code(25_000_000_000), Some(0));
        assert_eq!(line_rate_code(400_000_000_000), Some(4));
        assert_eq!(line_rate_code(40_000_000_000), None);
    }

    #[test]
    fn test_hop_units() {
        let hop = IntHop::new(1_000, 128 * 10 + 5, 80 * 3 + 79, 100_000_000_000, 1).unwrap();
        assert_eq!(hop.time(), 1_000);
        assert_eq!(hop.bytes(1), 1280);
        assert_eq!(hop.qlen(1), 240);
        assert_eq!(hop.line_rate(), 100_000_000_000);

        let scaled = IntHop::new(0, 256 * 7, 160 * 2, 25_000_000_000, 2).unwrap();
        assert_eq!(scaled.bytes(2), 256 * 7);
        assert_eq!(scaled.qlen(2), 320);
    }

    #[test]
    fn test_hop_rejects_unknown_rate() {
        assert!(IntHop::new(0, 0, 0, 10_000_000_000, 1).is_none());
    }

    #[test]
    fn test_deltas_across_wrap() {
        let earlier = IntHop::new((1 << 24) - 100, (1 << 20) * 128 - 128, 0, 25_000_000_000, 1).unwrap();
        let later = IntHop::new((1 << 24) + 50, (1 << 20) * 128 + 256, 0, 25_000_000_000, 1).unwrap();
        assert_eq!(later.time(), 50);
        assert_eq!(later.time_delta(&earlier), 150);
        assert_eq!(later.bytes_delta(&earlier, 1), 3 * 128);
    }

    #[test]
    fn test_push_hop_limit() {
        let mut header = IntHeader::new();
        for i in 0..MAX_HOPS as u64 {
            let hop = IntHop::new(i, 0, 0, 100_000_000_000, 1).unwrap();
            assert!(header.push_hop(hop));
        }
        let extra = IntHop::new(99, 0, 0, 100_000_000_000, 1).unwrap();
        assert!(!header.push_hop(extra));
        assert_eq!(header.hop_count(), MAX_HOPS);
        assert_eq!(header.hops()[4].time(), 4);
    }

    #[test]
    fn test_raise_power_keeps_max() {
        let mut header = IntHeader::new();
        header.raise_power(40);
        header.raise_power(12);
        assert_eq!(header.power(), 40);
        header.set_power(7);
        assert_eq!(header.power(), 7);
    }
}
