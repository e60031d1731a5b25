//! Port device collaborator.
//!
//! The engine never touches links directly: rates, queue depths and pause
//! state are read through [`SwitchDevices`], and every frame it emits goes
//! back out through the same trait.

use crate::packet::Packet;
use lossless_types::{PortIndex, QueueIndex};
use std::fmt;

/// PFC frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PfcAction {
    Pause,
    Resume,
}

impl fmt::Display for PfcAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PfcAction::Pause => write!(f, "pause"),
            PfcAction::Resume => write!(f, "resume"),
        }
    }
}

/// The set of port devices attached to one switch.
pub trait SwitchDevices {
    /// Link bit-rate in bits per second.
    fn bit_rate(&self, port: PortIndex) -> u64;

    /// Bytes currently queued for transmission on the port.
    fn queue_bytes(&self, port: PortIndex) -> u64;

    fn is_link_up(&self, port: PortIndex) -> bool;

    /// True while the peer has paused `queue` on this port.
    fn egress_paused(&self, port: PortIndex, queue: QueueIndex) -> bool;

    /// Send a PFC frame for `queue` to the peer on `port`.
    fn send_pfc(&mut self, port: PortIndex, queue: QueueIndex, action: PfcAction);

    /// Hand a packet to the port's egress scheduler.
    fn enqueue(&mut self, port: PortIndex, queue: QueueIndex, packet: Packet);

    /// Emit a sustained-pause signal towards the peer on `port`.
    fn send_signal(&mut self, port: PortIndex, event_id: u32);
}
