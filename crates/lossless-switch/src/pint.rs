//! PINT utilization estimate and its compressed encoding.
//!
//! The estimate is built the way a switch ASIC would: every multiplication
//! and division is done as addition and subtraction of fixed-point log2
//! values, with each log2 input truncated to a limited mantissa.

use crate::error::{SwitchError, SwitchResult};
use rand::Rng;

/// Width of the log2 integer part (`b`).
pub const LOG_INT_BITS: usize = 20;
/// Mantissa bits kept before taking the log2 (`m`).
pub const MANTISSA_BITS: u32 = 16;
/// Total width of a fixed-point log2 result (`l`).
pub const LOG_RESULT_BITS: u32 = 20;

/// Largest utilization the code must represent.
const MAX_UTILIZATION: f64 = 1024.0;

/// ceil(log2(b)) for b in 0..=32.
const LOG_INT_WIDTH: [u32; 33] = [
    0, 0, 1, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5,
];

/// Fractional bits of a log2 value with a `b`-bit integer part in an `l`-bit word.
pub fn logres_shift(b: usize, l: u32) -> u32 {
    l - LOG_INT_WIDTH[b.min(LOG_INT_WIDTH.len() - 1)]
}

/// Fixed-point `log2(x) * 2^logres_shift(b, l)` over a mantissa truncated to `m` bits.
///
/// Discarded low bits round up with probability proportional to their value.
/// Returns `None` for zero, which has no logarithm.
pub fn log2_approx<R: Rng + ?Sized>(x: u64, b: usize, m: u32, l: u32, rng: &mut R) -> Option<i64> {
    if x == 0 {
        return None;
    }
    let msb = u64::BITS - x.leading_zeros();
    let mut y = x;
    if msb > m {
        let dropped = msb - m;
        let mask = (1u64 << dropped) - 1;
        y = (x >> dropped) << dropped;
        if x & mask > rng.gen::<u64>() & mask {
            y += 1 << dropped;
        }
    }
    let scale = (1u64 << logres_shift(b, l)) as f64;
    Some(((y as f64).log2() * scale) as i64)
}

/// Logarithmic utilization code carried in the PINT power field.
///
/// Code 0 means "no utilization"; codes 1..2^n are `round(log_base(u)) + 2^(n-1)`,
/// clamped, so larger codes always mean higher utilization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PintCodec {
    log_base: f64,
    ln_base: f64,
    n_bits: u32,
}

impl PintCodec {
    pub fn new(log_base: f64) -> SwitchResult<Self> {
        if !(log_base > 1.0) || !log_base.is_finite() {
            return Err(SwitchError::invalid_config(
                "pint_log_base",
                format!("{} must be finite and > 1", log_base),
            ));
        }
        let ln_base = log_base.ln();
        let span = (MAX_UTILIZATION.ln() / ln_base).ceil();
        let n_bits = (2.0 * span + 1.0).log2().ceil() as u32;
        if n_bits > u16::BITS {
            return Err(SwitchError::invalid_config(
                "pint_log_base",
                format!("{} needs {} code bits (max 16)", log_base, n_bits),
            ));
        }
        Ok(Self {
            log_base,
            ln_base,
            n_bits,
        })
    }

    pub fn log_base(&self) -> f64 {
        self.log_base
    }

    /// Width of the code in bits.
    pub fn n_bits(&self) -> u32 {
        self.n_bits
    }

    fn bias(&self) -> i64 {
        1 << (self.n_bits - 1)
    }

    fn max_code(&self) -> i64 {
        (1 << self.n_bits) - 1
    }

    pub fn encode_u(&self, u: f64) -> u16 {
        if !(u > 0.0) {
            return 0;
        }
        let exponent = (u.ln() / self.ln_base).round();
        let code = if exponent.is_finite() {
            (exponent as i64 + self.bias()).clamp(1, self.max_code())
        } else {
            self.max_code()
        };
        code as u16
    }

    pub fn decode_u(&self, code: u16) -> f64 {
        if code == 0 {
            return 0.0;
        }
        let exponent = i64::from(code) - self.bias();
        self.log_base.powf(exponent as f64)
    }
}

/// Per-egress-port state feeding the estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortUtilization {
    /// Bytes transmitted on the port so far.
    pub tx_bytes: u64,
    /// Size of the previous dequeued packet.
    pub last_pkt_size: u32,
    /// Dequeue time of the previous packet, ns.
    pub last_pkt_ts: u64,
    /// Previous smoothed utilization.
    pub u: f64,
}

impl PortUtilization {
    /// Record a transmitted packet.
    pub fn on_transmit(&mut self, now: u64, size: u32) {
        self.tx_bytes += u64::from(size);
        self.last_pkt_size = size;
        self.last_pkt_ts = now;
    }
}

/// Approximate `u = qlen/(B*T) * dt/T + size/(B*T) + u_prev * (T - dt)/T`.
///
/// `dt` is the time since the previous dequeue capped at `max_rtt` (T), `B`
/// the link rate in bytes per ns. Each term is computed in the log domain.
pub fn estimate_utilization<R: Rng + ?Sized>(
    state: &PortUtilization,
    now: u64,
    max_rtt: u64,
    bit_rate: u64,
    qlen: u64,
    rng: &mut R,
) -> f64 {
    let bytes_per_sec = bit_rate / 8;
    if bytes_per_sec == 0 || max_rtt == 0 {
        return 0.0;
    }
    let dt = now.saturating_sub(state.last_pkt_ts).min(max_rtt);

    let (b, m, l) = (LOG_INT_BITS, MANTISSA_BITS, LOG_RESULT_BITS);
    let fct = (1u64 << logres_shift(b, l)) as f64;
    let log_t = (max_rtt as f64).log2() * fct;
    let log_b = (bytes_per_sec as f64).log2() * fct;
    let log_1e9 = 1e9f64.log2() * fct;
    let mut approx = |x: u64| log2_approx(x, b, m, l, rng).map(|v| v as f64);

    let mut qterm = 0.0;
    if qlen >> 8 > 0 {
        if let (Some(log_dt), Some(log_qlen)) = (approx(dt), approx(qlen >> 8)) {
            qterm = 2f64.powf((log_dt + log_qlen + log_1e9 - log_b - 2.0 * log_t) / fct) * 256.0;
        }
    }

    let mut byte_term = 0.0;
    if state.last_pkt_size > 0 {
        if let Some(log_byte) = approx(u64::from(state.last_pkt_size)) {
            byte_term = 2f64.powf((log_byte + log_1e9 - log_b - log_t) / fct);
        }
    }

    let mut u_term = 0.0;
    if max_rtt > dt && state.u > 0.0 {
        let scaled_u = (state.u * 8192.0).round() as u64;
        if let (Some(log_t_dt), Some(log_u)) = (approx(max_rtt - dt), approx(scaled_u)) {
            u_term = 2f64.powf((log_t_dt + log_u - log_t) / fct) / 8192.0;
        }
    }

    qterm + byte_term + u_term
}
