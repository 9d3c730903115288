use sysinfo::{Networks, System};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

/// Hardware counters read at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CounterSnapshot {
    /// System-wide CPU utilisation since the previous sample, in percent.
    pub cpu_percent: f64,
    pub memory: MemoryCounters,
    pub disk: DiskCounters,
    pub network: NetCounters,
}

/// Reads OS counters for the sampler.
pub trait CounterSource: Send + 'static {
    fn sample(&mut self) -> CounterSnapshot;
}

/// Counters from the running machine.
///
/// CPU, memory and network come from `sysinfo`; disk I/O is summed over
/// whole block devices in `/proc/diskstats` (zero elsewhere). The `System`
/// is kept between samples so CPU usage is measured across ticks; the first
/// sample reports 0.
pub struct SystemCounters {
    system: System,
}

impl SystemCounters {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for SystemCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for SystemCounters {
    fn sample(&mut self) -> CounterSnapshot {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let memory = MemoryCounters {
            total: self.system.total_memory(),
            available: self.system.available_memory(),
            used: self.system.used_memory(),
            free: self.system.free_memory(),
        };

        let mut network = NetCounters::default();
        let networks = Networks::new_with_refreshed_list();
        for (_, data) in &networks {
            network.bytes_sent += data.total_transmitted();
            network.bytes_recv += data.total_received();
            network.packets_sent += data.total_packets_transmitted();
            network.packets_recv += data.total_packets_received();
        }

        CounterSnapshot {
            cpu_percent: f64::from(self.system.global_cpu_usage()),
            memory,
            disk: disk_counters(),
            network,
        }
    }
}

#[cfg(target_os = "linux")]
fn disk_counters() -> DiskCounters {
    match std::fs::read_to_string("/proc/diskstats") {
        Ok(text) => parse_diskstats(&text, |name| {
            std::path::Path::new("/sys/block").join(name.replace('/', "!")).exists()
        }),
        Err(e) => {
            tracing::debug!(target: "fedlog", error = %e, "cannot read /proc/diskstats");
            DiskCounters::default()
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn disk_counters() -> DiskCounters {
    DiskCounters::default()
}

const SECTOR_SIZE: u64 = 512;

/// Sum `/proc/diskstats` rows whose device passes `is_disk`.
///
/// Columns used: 3 reads completed, 5 sectors read, 7 writes completed,
/// 9 sectors written (0-based).
pub fn parse_diskstats<F>(text: &str, is_disk: F) -> DiskCounters
where
    F: Fn(&str) -> bool,
{
    let mut out = DiskCounters::default();
    for line in text.lines() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 10 || !is_disk(cols[2]) {
            continue;
        }
        let num = |i: usize| cols[i].parse::<u64>().unwrap_or(0);
        out.read_count += num(3);
        out.read_bytes += num(5) * SECTOR_SIZE;
        out.write_count += num(7);
        out.write_bytes += num(9) * SECTOR_SIZE;
    }
    out
}
