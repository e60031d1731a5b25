//! Telemetry report sink.
//!
//! Reports are plain text, one framed block per signal or polling event:
//!
//! ```text
//! time <ns>
//!
//! signal
//!
//! epoch now
//! ...
//! epoch last
//! ...
//! end
//! ```

use crate::error::SwitchResult;
use crate::telemetry::{EpochClock, TelemetryTables};
use lossless_types::PortIndex;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

const FLOW_HEADER: &str = "flowIdx srcIp dstIp srcPort dstPort protocol minSeq maxSeq packetNum enqQdepth pfcPausedPacketNum";
const PORT_HEADER: &str = "enqQdepth pfcPausedPacketNum packetNum";

/// Event that triggered a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Signal,
    Polling,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Signal => write!(f, "signal"),
            ReportKind::Polling => write!(f, "polling"),
        }
    }
}

/// Recent ingress-to-egress volume printed ahead of a signal report block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficMeter {
    pub from: PortIndex,
    pub bytes: u64,
}

/// Owns the report stream and flushes it when dropped.
pub struct TelemetryWriter<W: Write> {
    out: W,
}

impl TelemetryWriter<BufWriter<File>> {
    /// Create (truncate) a report file.
    pub fn create(path: impl AsRef<Path>) -> SwitchResult<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        info!("Writing telemetry reports to {}", path.display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TelemetryWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Open a report frame.
    pub fn begin(&mut self, now: u64, kind: ReportKind) -> io::Result<()> {
        write!(self.out, "time {}\n\n{}\n\n", now, kind)
    }

    /// Close a report frame.
    pub fn end(&mut self) -> io::Result<()> {
        self.out.write_all(b"end\n\n")
    }

    /// Current and previous epoch telemetry of one egress port.
    pub fn port_block(
        &mut self,
        now: u64,
        port: PortIndex,
        meter: Option<TrafficMeter>,
        tables: &TelemetryTables,
    ) -> io::Result<()> {
        let clock = tables.clock();
        let epoch = clock.index(now);

        self.out.write_all(b"epoch now\n\n")?;
        if let Some(meter) = meter {
            writeln!(self.out, "traffic meter from port {} to port {}", meter.from, port)?;
            write!(self.out, "portToPortBytes\n{}\n\n", meter.bytes)?;
        }
        self.epoch_section(now, port, epoch, clock.current_window(), tables)?;

        self.out.write_all(b"\nepoch last\n\n")?;
        let last = EpochClock::previous(epoch);
        self.epoch_section(now, port, last, clock.last_window(), tables)?;
        self.out.write_all(b"\n")
    }

    fn epoch_section(
        &mut self,
        now: u64,
        port: PortIndex,
        epoch: usize,
        max_age: u64,
        tables: &TelemetryTables,
    ) -> io::Result<()> {
        let p = tables.port_entry(port, epoch);
        writeln!(self.out, "port telemetry for port {}", port)?;
        writeln!(self.out, "{}", PORT_HEADER)?;
        write!(
            self.out,
            "{} {} {}\n\n",
            p.enq_qdepth, p.pfc_paused_packet_num, p.packet_num
        )?;

        writeln!(self.out, "flow telemetry for port {}", port)?;
        writeln!(self.out, "{}", FLOW_HEADER)?;
        for (idx, f) in tables.flows(port, epoch).iter().enumerate() {
            if f.tuple.is_empty() || now.saturating_sub(f.last_time_step) > max_age {
                continue;
            }
            writeln!(
                self.out,
                "{} {:08x} {:08x} {} {} {} {} {} {} {} {}",
                idx,
                f.tuple.src_ip,
                f.tuple.dst_ip,
                f.tuple.src_port,
                f.tuple.dst_port,
                f.tuple.protocol,
                f.min_seq,
                f.max_seq,
                f.packet_num,
                f.enq_qdepth,
                f.pfc_paused_packet_num
            )?;
        }
        Ok(())
    }
}

impl<W: Write> Drop for TelemetryWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.out.flush() {
            warn!("Failed to flush telemetry reports: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::EnqueueSample;
    use lossless_types::{FiveTuple, Ipv4Address, L3Protocol};
    use pretty_assertions::assert_eq;

    const EPOCH: u64 = 1_000_000;

    fn render(f: impl FnOnce(&mut TelemetryWriter<Vec<u8>>)) -> String {
        let mut writer = TelemetryWriter::new(Vec::new());
        f(&mut writer);
        String::from_utf8(writer.get_ref().clone()).unwrap()
    }

    #[test]
    fn test_empty_port_block() {
        let tables = TelemetryTables::new(3, 16, EpochClock::new(EPOCH));
        let out = render(|w| {
            w.begin(42, ReportKind::Polling).unwrap();
            w.port_block(42, PortIndex::new(1), None, &tables).unwrap();
            w.end().unwrap();
        });
        let expected = "time 42\n\npolling\n\n\
epoch now\n\n\
port telemetry for port 1\n\
enqQdepth pfcPausedPacketNum packetNum\n\
0 0 0\n\n\
flow telemetry for port 1\n\
flowIdx srcIp dstIp srcPort dstPort protocol minSeq maxSeq packetNum enqQdepth pfcPausedPacketNum\n\
\nepoch last\n\n\
port telemetry for port 1\n\
enqQdepth pfcPausedPacketNum packetNum\n\
0 0 0\n\n\
flow telemetry for port 1\n\
flowIdx srcIp dstIp srcPort dstPort protocol minSeq maxSeq packetNum enqQdepth pfcPausedPacketNum\n\
\nend\n\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_flow_rows_and_traffic_meter() {
        let mut tables = TelemetryTables::new(3, 16, EpochClock::new(EPOCH));
        let port = PortIndex::new(2);
        let flow = FiveTuple::new(
            Ipv4Address::new(11, 0, 0, 1),
            Ipv4Address::new(11, 0, 1, 1),
            10000,
            100,
            L3Protocol::Udp,
        );
        let now = 3 * EPOCH + 10;
        tables.record(now - 5, port, flow, 7, EnqueueSample { queue_length: 3, paused: false });
        tables.record(now, port, flow, 9, EnqueueSample { queue_length: 4, paused: true });
        let idx = tables.flow_index(&flow);

        let meter = TrafficMeter {
            from: PortIndex::new(1),
            bytes: 2096,
        };
        let out = render(|w| w.port_block(now, port, Some(meter), &tables).unwrap());

        assert!(out.starts_with(
            "epoch now\n\ntraffic meter from port 1 to port 2\nportToPortBytes\n2096\n\n"
        ));
        assert!(out.contains("port telemetry for port 2\nenqQdepth pfcPausedPacketNum packetNum\n5 1 2\n"));
        let row = format!("{} 0b000001 0b000101 10000 100 17 7 9 2 2 1\n", idx);
        assert!(out.contains(&row), "missing row in:\n{}", out);
        // Nothing recorded for the previous epoch
        let last = out.split("epoch last").nth(1).unwrap();
        assert!(!last.contains(&row));
    }

    #[test]
    fn test_stale_rows_filtered() {
        let mut tables = TelemetryTables::new(3, 16, EpochClock::new(EPOCH));
        let port = PortIndex::new(1);
        let flow = FiveTuple::new(
            Ipv4Address::new(1, 2, 3, 4),
            Ipv4Address::new(5, 6, 7, 8),
            1,
            2,
            L3Protocol::Udp,
        );
        tables.record(EPOCH * 2, port, flow, 0, EnqueueSample { queue_length: 1, paused: false });

        // Two epochs later the same slot is current again but the row is too old
        let out = render(|w| w.port_block(EPOCH * 4 + 1, port, None, &tables).unwrap());
        assert!(!out.contains("01020304"));

        // One epoch later it is shown as last epoch
        let out = render(|w| w.port_block(EPOCH * 3, port, None, &tables).unwrap());
        let last = out.split("epoch last").nth(1).unwrap();
        assert!(last.contains("01020304 05060708"));
    }

    #[test]
    fn test_create_file_and_flush_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.txt");
        {
            let mut writer = TelemetryWriter::create(&path).unwrap();
            writer.begin(1, ReportKind::Signal).unwrap();
            writer.end().unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "time 1\n\nsignal\n\nend\n\n");
    }
}
