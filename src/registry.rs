use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::config::LoggerConfig;
use crate::error::Result;
use crate::level::Severity;
use crate::logger::LoggerHandle;
use crate::render::Rendered;
use crate::sink::Sink;

/// Named logger state shared by every handle bound to that name: a
/// threshold and at most one sink.
#[derive(Debug)]
pub struct CoreLogger {
    name: String,
    threshold: RwLock<Severity>,
    sink: RwLock<Option<Sink>>,
}

impl CoreLogger {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            threshold: RwLock::new(Severity::Notset),
            sink: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> Severity {
        *self.threshold.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_threshold(&self, level: Severity) {
        *self.threshold.write().unwrap_or_else(|p| p.into_inner()) = level;
    }

    /// Detach the current sink, if any. Returns whether one was attached.
    pub fn clear_sinks(&self) -> bool {
        self.sink.write().unwrap_or_else(|p| p.into_inner()).take().is_some()
    }

    /// Attach `sink`, replacing any previous one.
    pub fn attach(&self, sink: Sink) {
        *self.sink.write().unwrap_or_else(|p| p.into_inner()) = Some(sink);
    }

    pub fn sink_kind(&self) -> Option<&'static str> {
        self.sink
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map(Sink::kind)
    }

    pub fn emit(&self, rendered: &Rendered) {
        if let Some(sink) = self.sink.read().unwrap_or_else(|p| p.into_inner()).as_ref() {
            sink.emit(rendered);
        }
    }
}

/// Application-owned map of logger name to [`CoreLogger`].
///
/// Loggers are created on first lookup. `reset` detaches a logger's sink and
/// forgets it, so the next lookup starts clean.
#[derive(Debug, Default)]
pub struct LoggerRegistry {
    loggers: Mutex<HashMap<String, Arc<CoreLogger>>>,
}

impl LoggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<CoreLogger>>> {
        self.loggers.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Logger registered under `name`, created if missing.
    pub fn get_logger(&self, name: &str) -> Arc<CoreLogger> {
        Arc::clone(
            self.lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CoreLogger::new(name))),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Detach the sink of `name` and remove it. Returns whether it existed.
    pub fn reset(&self, name: &str) -> bool {
        match self.lock().remove(name) {
            Some(core) => {
                core.clear_sinks();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for (_, core) in self.lock().drain() {
            core.clear_sinks();
        }
    }

    /// Reset the logger named by `config` and return a freshly initialised
    /// handle for it.
    pub fn reconfigure(self: &Arc<Self>, config: LoggerConfig) -> Result<LoggerHandle> {
        self.reset(&config.logger_name);
        let mut handle = LoggerHandle::with_registry(config, Arc::clone(self));
        handle.initialise()?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_the_same_logger() {
        let registry = LoggerRegistry::new();
        let a = registry.get_logger("WKR_w1");
        let b = registry.get_logger("WKR_w1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.names(), vec!["WKR_w1"]);
    }

    #[test]
    fn attach_keeps_a_single_sink() {
        let registry = LoggerRegistry::new();
        let core = registry.get_logger("x");
        core.attach(Sink::discard());
        core.attach(Sink::Discard { echo_stdout: true });
        assert_eq!(core.sink_kind(), Some("discard"));
        assert!(core.clear_sinks());
        assert!(!core.clear_sinks());
    }

    #[test]
    fn reset_forgets_and_detaches() {
        let registry = LoggerRegistry::new();
        let core = registry.get_logger("x");
        core.attach(Sink::discard());
        assert!(registry.reset("x"));
        assert!(core.sink_kind().is_none());
        assert!(!registry.contains("x"));
        assert!(!registry.reset("x"));
    }
}
