use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fedlog::error::{Error, UsageError};
use fedlog::stage::DynFilter;
use fedlog::sysmetrics::counters::{DiskCounters, MemoryCounters, NetCounters};
use fedlog::sysmetrics::{CounterSnapshot, CounterSource, StopSignal, TELEMETRY_FIELDS};
use fedlog::{Role, RoleLogger, SysmetricLogger, TrackTarget, Variant};
use serde_json::Value;
use tokio::sync::mpsc;

/// Counters that grow by one unit per sample.
#[derive(Clone, Default)]
struct Ramp {
    samples: Arc<AtomicU64>,
}

impl CounterSource for Ramp {
    fn sample(&mut self) -> CounterSnapshot {
        let n = self.samples.fetch_add(1, Ordering::Relaxed) + 1;
        CounterSnapshot {
            cpu_percent: 12.5,
            memory: MemoryCounters {
                total: 16_000,
                available: 8_000,
                used: 7_000,
                free: 1_000,
            },
            disk: DiskCounters {
                read_count: n,
                write_count: n,
                read_bytes: n * 512,
                write_bytes: n * 512,
            },
            network: NetCounters {
                bytes_sent: n * 100,
                bytes_recv: n * 200,
                packets_sent: n,
                packets_recv: n,
            },
        }
    }
}

fn sampler(counters: Ramp) -> SysmetricLogger {
    SysmetricLogger::from_role(
        RoleLogger::new(Role::Sysmetrics, "127.0.0.1", "node1").variant(Variant::Test),
    )
    .with_counters(counters)
}

#[tokio::test(start_paused = true)]
async fn samples_once_per_resolution_and_stops_cleanly() {
    let counters = Ramp::default();
    let mut sysmetrics = sampler(counters.clone());
    sysmetrics
        .track(
            TrackTarget::new("tests/sysmetrics_sampler.rs", "Trainer", "fit"),
            Duration::from_millis(100),
            &[],
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert_eq!(sysmetrics.terminate().await.unwrap(), 0);

    let records = sysmetrics.handle().capture().unwrap().entries();
    let probes: Vec<_> = records
        .iter()
        .filter(|r| r.event() == "SYS_node1 - Probing system's hardware usage")
        .collect();
    assert!((10..=12).contains(&probes.len()), "got {} probes", probes.len());
    assert_eq!(probes.len() as u64, counters.samples.load(Ordering::Relaxed));

    for probe in &probes {
        for field in TELEMETRY_FIELDS {
            assert!(probe.contains_key(field), "missing {field}");
        }
        assert!(probe.get("cpu_percent").unwrap().is_f64());
        assert!(probe.get("memory_total").unwrap().is_u64());
        assert!(probe.get("net_bytes_recv").unwrap().is_u64());
        assert_eq!(probe.get("resolution").unwrap(), &Value::from(0.1));
        assert_eq!(probe.get("ID_path").unwrap(), "tests/sysmetrics_sampler.rs");
        assert_eq!(probe.get("ID_class").unwrap(), "Trainer");
        assert_eq!(probe.get("ID_function").unwrap(), "fit");
    }

    // counters are re-read on every tick
    let first = probes[0].get("disk_read_counter").unwrap().as_u64().unwrap();
    let last = probes.last().unwrap().get("disk_read_counter").unwrap().as_u64().unwrap();
    assert!(last > first);

    let tail: Vec<String> = records.iter().rev().take(2).map(|r| r.event()).collect();
    assert_eq!(tail[0], "Sysmetric operations stopped.");
    assert_eq!(tail[1], "Signal SIGTERM of code 15 has been received.");
}

#[tokio::test(start_paused = true)]
async fn second_terminate_is_a_usage_error() {
    let mut sysmetrics = sampler(Ramp::default());
    sysmetrics
        .track(TrackTarget::default(), Duration::from_millis(50), &[])
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(sysmetrics.terminate().await.unwrap(), 0);
    let err = sysmetrics.terminate().await.unwrap_err();
    assert!(matches!(err, Error::Usage(UsageError::NotTracking { .. })));
}

#[tokio::test(start_paused = true)]
async fn tracking_can_restart_after_terminate() {
    let counters = Ramp::default();
    let mut sysmetrics = sampler(counters.clone());
    let target = TrackTarget::new("main.rs", "", "main");

    sysmetrics.track(target.clone(), Duration::from_millis(100), &[]).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    sysmetrics.terminate().await.unwrap();
    let after_first = counters.samples.load(Ordering::Relaxed);

    let tracker = sysmetrics.track(target, Duration::from_millis(100), &[]).unwrap();
    assert_eq!(tracker.resolution(), Duration::from_millis(100));
    tokio::time::sleep(Duration::from_millis(250)).await;
    sysmetrics.terminate().await.unwrap();

    assert!(counters.samples.load(Ordering::Relaxed) > after_first);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_logger_stops_sampling() {
    let mut sysmetrics = sampler(Ramp::default());
    sysmetrics
        .track(TrackTarget::default(), Duration::from_millis(100), &[])
        .unwrap();
    let captured = sysmetrics.handle().capture().unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    let at_drop = captured.len();
    drop(sysmetrics);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let after_drop = captured.len();
    assert_eq!(after_drop, at_drop + 2);
    assert_eq!(captured.entries().last().unwrap().event(), "Sysmetric operations stopped.");

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(captured.len(), after_drop);
}

#[tokio::test(start_paused = true)]
async fn interrupt_signal_stops_with_status_zero() {
    let (signals, receiver) = mpsc::channel(1);
    let mut sysmetrics = sampler(Ramp::default()).stop_signals(receiver);
    sysmetrics
        .track(TrackTarget::default(), Duration::from_millis(50), &[])
        .unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    signals.send(StopSignal::Interrupt).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!sysmetrics.is_tracking());
    assert_eq!(sysmetrics.terminate().await.unwrap(), 0);

    let records = sysmetrics.handle().capture().unwrap().entries();
    let received = &records[records.len() - 2];
    assert_eq!(received.event(), "Signal SIGINT of code 2 has been received.");
    assert_eq!(received.get("signame").unwrap(), "SIGINT");
    assert_eq!(received.get("signnum").unwrap(), 2);
    assert_eq!(records.last().unwrap().event(), "Sysmetric operations stopped.");
}

#[tokio::test(start_paused = true)]
async fn failed_sample_ends_tracking_with_status_one() {
    let broken = DynFilter::new("broken_filter", 1, |args| args[0].clone());
    let mut sysmetrics = SysmetricLogger::from_role(
        RoleLogger::new(Role::Sysmetrics, "127.0.0.1", "node1")
            .variant(Variant::Test)
            .filter(Arc::new(broken)),
    )
    .with_counters(Ramp::default());
    sysmetrics
        .track(TrackTarget::default(), Duration::from_millis(50), &[])
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!sysmetrics.is_tracking());
    assert!(sysmetrics.tracker().unwrap().is_finished());
    assert_eq!(sysmetrics.terminate().await.unwrap(), 1);
    assert!(sysmetrics.handle().capture().unwrap().is_empty());
}
