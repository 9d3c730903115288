use std::sync::Arc;

use crate::error::PipelineError;
use crate::level::Severity;
use crate::record::EventRecord;
use crate::stage::{Flow, LoggerRef, Processor, SharedProcessor};

use super::counters::{CounterSnapshot, DiskCounters, MemoryCounters, NetCounters};

/// Field names written by the collection stages.
pub const TELEMETRY_FIELDS: [&str; 13] = [
    "cpu_percent",
    "memory_total",
    "memory_available",
    "memory_used",
    "memory_free",
    "disk_read_counter",
    "disk_write_counter",
    "disk_read_bytes",
    "disk_write_bytes",
    "net_bytes_sent",
    "net_bytes_recv",
    "net_packets_sent",
    "net_packets_recv",
];

/// The four collection stages for one snapshot, in order.
pub fn collection_stages(snapshot: &CounterSnapshot) -> Vec<SharedProcessor> {
    vec![
        Arc::new(CpuStats(snapshot.cpu_percent)),
        Arc::new(MemoryStats(snapshot.memory)),
        Arc::new(DiskStats(snapshot.disk)),
        Arc::new(NetworkStats(snapshot.network)),
    ]
}

pub struct CpuStats(pub f64);

impl Processor for CpuStats {
    fn name(&self) -> &str {
        "track_cpu_stats"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        record.insert("cpu_percent", self.0);
        Ok(Flow::Continue(record))
    }
}

pub struct MemoryStats(pub MemoryCounters);

impl Processor for MemoryStats {
    fn name(&self) -> &str {
        "track_memory_stats"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        record.insert("memory_total", self.0.total);
        record.insert("memory_available", self.0.available);
        record.insert("memory_used", self.0.used);
        record.insert("memory_free", self.0.free);
        Ok(Flow::Continue(record))
    }
}

pub struct DiskStats(pub DiskCounters);

impl Processor for DiskStats {
    fn name(&self) -> &str {
        "track_disk_stats"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        record.insert("disk_read_counter", self.0.read_count);
        record.insert("disk_write_counter", self.0.write_count);
        record.insert("disk_read_bytes", self.0.read_bytes);
        record.insert("disk_write_bytes", self.0.write_bytes);
        Ok(Flow::Continue(record))
    }
}

pub struct NetworkStats(pub NetCounters);

impl Processor for NetworkStats {
    fn name(&self) -> &str {
        "track_network_stats"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        record.insert("net_bytes_sent", self.0.bytes_sent);
        record.insert("net_bytes_recv", self.0.bytes_recv);
        record.insert("net_packets_sent", self.0.packets_sent);
        record.insert("net_packets_recv", self.0.packets_recv);
        Ok(Flow::Continue(record))
    }
}
