//! Port and priority-queue indices.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of priority queues per port.
pub const QUEUE_COUNT: usize = 8;

/// The lossless control priority. Exempt from admission control and ECN.
pub const CONTROL_QUEUE: QueueIndex = QueueIndex(0);

/// Index of a switch port (device interface index).
///
/// Port 0 is the loopback interface of a node; data ports start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortIndex(u32);

impl PortIndex {
    pub const fn new(index: u32) -> Self {
        PortIndex(index)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Array index for per-port tables.
    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PortIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PortIndex {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(PortIndex)
            .map_err(|_| ParseError::InvalidPortIndex(s.to_string()))
    }
}

impl From<u32> for PortIndex {
    fn from(index: u32) -> Self {
        PortIndex(index)
    }
}

/// Priority queue index within a port (0-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QueueIndex(u8);

impl QueueIndex {
    /// Creates a queue index, rejecting values outside 0-7.
    pub fn new(index: u8) -> Result<Self, ParseError> {
        if (index as usize) < QUEUE_COUNT {
            Ok(QueueIndex(index))
        } else {
            Err(ParseError::InvalidQueueIndex(index as u32))
        }
    }

    /// Maps a carried traffic class onto a queue, keeping the low three bits.
    pub const fn from_traffic_class(class: u16) -> Self {
        QueueIndex((class as usize % QUEUE_COUNT) as u8)
    }

    pub const fn value(&self) -> u8 {
        self.0
    }

    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }

    /// Returns true for the lossless control priority.
    pub const fn is_control(&self) -> bool {
        self.0 == CONTROL_QUEUE.0
    }

    /// Iterates over all eight queue indices.
    pub fn all() -> impl Iterator<Item = QueueIndex> {
        (0..QUEUE_COUNT as u8).map(QueueIndex)
    }
}

impl TryFrom<u8> for QueueIndex {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        QueueIndex::new(value)
    }
}

impl From<QueueIndex> for u8 {
    fn from(queue: QueueIndex) -> Self {
        queue.0
    }
}

impl fmt::Display for QueueIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_index_bounds() {
        assert!(QueueIndex::new(0).is_ok());
        assert!(QueueIndex::new(7).is_ok());
        assert_eq!(
            QueueIndex::new(8),
            Err(ParseError::InvalidQueueIndex(8))
        );
    }

    #[test]
    fn test_control_queue() {
        assert!(CONTROL_QUEUE.is_control());
        assert!(!QueueIndex::new(3).unwrap().is_control());
    }

    #[test]
    fn test_from_traffic_class() {
        assert_eq!(QueueIndex::from_traffic_class(3).value(), 3);
        assert_eq!(QueueIndex::from_traffic_class(11).value(), 3);
    }

    #[test]
    fn test_all_queues() {
        let queues: Vec<u8> = QueueIndex::all().map(|q| q.value()).collect();
        assert_eq!(queues, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_port_index_parse() {
        assert_eq!("12".parse::<PortIndex>().unwrap(), PortIndex::new(12));
        assert!("eth0".parse::<PortIndex>().is_err());
    }
}
