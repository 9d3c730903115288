//! Background sampler that logs hardware usage at a fixed resolution.
//!
//! [`SysmetricLogger::track`] spawns a tokio task owning a snapshot of the
//! logger configuration. Every tick it samples the counters, rebuilds the
//! processor chain with fresh collection stages and emits one record, until
//! [`SysmetricLogger::terminate`], a stop signal or dropping the logger stops
//! it.

pub mod counters;
pub mod stages;

use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, Result, UsageError};
use crate::logger::{BoundLogger, LoggerHandle};
use crate::record::LogCall;
use crate::registry::LoggerRegistry;
use crate::role::{Role, RoleLogger};

pub use counters::{CounterSnapshot, CounterSource, SystemCounters};
pub use stages::{collection_stages, TELEMETRY_FIELDS};

type SharedCounters = Arc<Mutex<Box<dyn CounterSource>>>;

/// Where `track` was called from, attached to every sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTarget {
    pub file_path: String,
    pub class_name: String,
    pub function_name: String,
}

impl TrackTarget {
    pub fn new(
        file_path: impl Into<String>,
        class_name: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            class_name: class_name.into(),
            function_name: function_name.into(),
        }
    }

    fn descriptors(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ID_path".into(), self.file_path.clone().into());
        map.insert("ID_class".into(), self.class_name.clone().into());
        map.insert("ID_function".into(), self.function_name.clone().into());
        map
    }
}

/// Why the sampler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

impl StopSignal {
    pub fn name(self) -> &'static str {
        match self {
            StopSignal::Interrupt => "SIGINT",
            StopSignal::Terminate => "SIGTERM",
        }
    }

    pub fn number(self) -> i32 {
        match self {
            StopSignal::Interrupt => 2,
            StopSignal::Terminate => 15,
        }
    }
}

/// Where stop signals come from, besides `terminate`.
#[derive(Clone, Default)]
enum SignalSource {
    #[default]
    None,
    Os,
    Channel(Arc<tokio::sync::Mutex<mpsc::Receiver<StopSignal>>>),
}

/// A running sampler task. Dropping it stops the task.
pub struct Tracker {
    token: CancellationToken,
    task: JoinHandle<i32>,
    resolution: Duration,
}

impl Tracker {
    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// True once the task has exited on its own (a failed emit) or after a
    /// stop request.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Role logger (`SYS_` prefix, port 9100) that samples hardware counters in
/// the background.
pub struct SysmetricLogger {
    handle: LoggerHandle,
    tracker: Option<Tracker>,
    counters: Option<SharedCounters>,
    signals: SignalSource,
}

impl SysmetricLogger {
    pub fn new(server: impl Into<String>, label: &str) -> Self {
        Self::from_role(RoleLogger::new(Role::Sysmetrics, server, label))
    }

    pub fn from_role(role: RoleLogger) -> Self {
        Self::from_handle(role.build())
    }

    pub fn from_handle(handle: LoggerHandle) -> Self {
        Self {
            handle,
            tracker: None,
            counters: None,
            signals: SignalSource::None,
        }
    }

    pub fn in_registry(server: impl Into<String>, label: &str, registry: Arc<LoggerRegistry>) -> Self {
        Self::from_role(RoleLogger::new(Role::Sysmetrics, server, label).registry(registry))
    }

    /// Replace the OS counters (defaults to [`SystemCounters`]).
    pub fn with_counters(mut self, counters: impl CounterSource) -> Self {
        let counters: Box<dyn CounterSource> = Box::new(counters);
        self.counters = Some(Arc::new(Mutex::new(counters)));
        self
    }

    /// Also stop on SIGINT/SIGTERM (Ctrl-C on non-unix) delivered to this
    /// process. Off by default, since it takes over the process's signals.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.signals = if enabled { SignalSource::Os } else { SignalSource::None };
        self
    }

    /// Take stop signals from `signals` instead of the OS. A received signal
    /// stops the sampler exactly like the OS one would.
    pub fn stop_signals(mut self, signals: mpsc::Receiver<StopSignal>) -> Self {
        self.signals = SignalSource::Channel(Arc::new(tokio::sync::Mutex::new(signals)));
        self
    }

    pub fn handle(&self) -> &LoggerHandle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut LoggerHandle {
        &mut self.handle
    }

    /// True while the sampler task is running.
    pub fn is_tracking(&self) -> bool {
        self.tracker.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn tracker(&self) -> Option<&Tracker> {
        self.tracker.as_ref()
    }

    /// Start sampling every `resolution`. No-op if already tracking; a task
    /// that stopped on its own is replaced.
    ///
    /// `censor_keys` are added to the logger's censor list when the handle
    /// has not been initialised yet. Must be called within a tokio runtime.
    pub fn track(
        &mut self,
        target: TrackTarget,
        resolution: Duration,
        censor_keys: &[String],
    ) -> Result<&Tracker> {
        if self.tracker.as_ref().is_some_and(Tracker::is_finished) {
            self.tracker = None;
        }

        if self.tracker.is_none() {
            let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

            if !self.handle.is_initialised() {
                let config = self.handle.config_mut();
                for key in censor_keys {
                    if !config.censor_keys.contains(key) {
                        config.censor_keys.push(key.clone());
                    }
                }
            }
            let bound = self.handle.initialise()?;

            let counters = self.counters.get_or_insert_with(|| {
                let system: Box<dyn CounterSource> = Box::new(SystemCounters::new());
                Arc::new(Mutex::new(system))
            });
            let token = CancellationToken::new();
            let task = runtime.spawn(run_sampler(
                bound,
                Arc::clone(counters),
                target.descriptors(),
                resolution,
                token.clone(),
                self.signals.clone(),
            ));

            tracing::info!(
                target: "fedlog",
                logger = %self.handle.name(),
                resolution_ms = resolution.as_millis() as u64,
                "sysmetric tracking started"
            );
            self.tracker = Some(Tracker {
                token,
                task,
                resolution,
            });
        }

        self.tracker
            .as_ref()
            .ok_or_else(|| UsageError::NotTracking { logger: self.handle.name().to_string() }.into())
    }

    /// Stop the sampler, wait for it to exit and return its exit status
    /// (0 on a clean stop, 1 if it had already stopped on a failed emit).
    pub async fn terminate(&mut self) -> Result<i32> {
        let mut tracker = self.tracker.take().ok_or_else(|| UsageError::NotTracking {
            logger: self.handle.name().to_string(),
        })?;

        tracker.token.cancel();
        match (&mut tracker.task).await {
            Ok(status) => {
                tracing::info!(target: "fedlog", logger = %self.handle.name(), status, "sysmetric tracking stopped");
                Ok(status)
            }
            Err(e) => Err(UsageError::SamplerJoin {
                logger: self.handle.name().to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

async fn run_sampler(
    bound: BoundLogger,
    counters: SharedCounters,
    descriptors: Map<String, Value>,
    resolution: Duration,
    token: CancellationToken,
    signals: SignalSource,
) -> i32 {
    let event = format!("{} - Probing system's hardware usage", bound.name());
    let stop = wait_for_stop(&token, &signals);
    tokio::pin!(stop);

    loop {
        // sysinfo and /proc reads block
        let source = Arc::clone(&counters);
        let sampled = tokio::task::spawn_blocking(move || {
            source.lock().unwrap_or_else(|p| p.into_inner()).sample()
        })
        .await;
        let snapshot = match sampled {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(target: "fedlog", logger = %bound.name(), error = %e, "counter sampling failed, stopping");
                return 1;
            }
        };

        // collection stages hold the snapshot they were built from, so the
        // chain is rebuilt every tick
        let tick = bound.with_chain(bound.builder().build_with(collection_stages(&snapshot)));
        let call = LogCall::new(event.as_str())
            .field("resolution", resolution.as_secs_f64())
            .fields(descriptors.clone());

        if let Err(e) = tick.info(call) {
            tracing::error!(target: "fedlog", logger = %bound.name(), error = %e, "sysmetric sample failed, stopping");
            return 1;
        }

        tokio::select! {
            signal = &mut stop => {
                farewell(&bound, signal);
                return 0;
            }
            _ = tokio::time::sleep(resolution) => {}
        }
    }
}

fn farewell(bound: &BoundLogger, signal: StopSignal) {
    let received = LogCall::new(format!(
        "Signal {} of code {} has been received.",
        signal.name(),
        signal.number()
    ))
    .field("signame", signal.name())
    .field("signnum", signal.number());

    for call in [received, LogCall::new("Sysmetric operations stopped.")] {
        if let Err(e) = bound.info(call) {
            tracing::warn!(target: "fedlog", logger = %bound.name(), error = %e, "farewell record not emitted");
        }
    }
}

async fn wait_for_stop(token: &CancellationToken, signals: &SignalSource) -> StopSignal {
    match signals {
        SignalSource::None => {
            token.cancelled().await;
            StopSignal::Terminate
        }
        SignalSource::Os => tokio::select! {
            _ = token.cancelled() => StopSignal::Terminate,
            signal = os_signal() => signal,
        },
        SignalSource::Channel(receiver) => {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                _ = token.cancelled() => StopSignal::Terminate,
                Some(signal) = receiver.recv() => signal,
            }
        }
    }
}

#[cfg(unix)]
async fn os_signal() -> StopSignal {
    use tokio::signal::unix::{signal, SignalKind};

    match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
        (Ok(mut interrupt), Ok(mut terminate)) => tokio::select! {
            _ = interrupt.recv() => StopSignal::Interrupt,
            _ = terminate.recv() => StopSignal::Terminate,
        },
        _ => {
            tracing::warn!(target: "fedlog", "cannot install signal handlers, relying on terminate()");
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
async fn os_signal() -> StopSignal {
    match tokio::signal::ctrl_c().await {
        Ok(()) => StopSignal::Interrupt,
        Err(_) => std::future::pending().await,
    }
}
