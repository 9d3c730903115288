use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::backend::make_sink_from_config;
use crate::chain::{ChainBuilder, ProcessorChain};
use crate::config::LoggerConfig;
use crate::error::{Result, UsageError};
use crate::level::Severity;
use crate::record::LogCall;
use crate::registry::{CoreLogger, LoggerRegistry};
use crate::render::{CaptureBuffer, Rendered};
use crate::stage::LoggerRef;

/// Named, leveled logging entry point.
///
/// A handle starts uninitialised. [`initialise`](Self::initialise) attaches a
/// sink and binds a processor chain exactly once; later calls return the
/// same [`BoundLogger`]. To change configuration, build a new handle (or use
/// [`LoggerRegistry::reconfigure`]).
///
/// ```
/// use fedlog::{LoggerConfig, LoggerHandle};
///
/// let mut handle = LoggerHandle::new(LoggerConfig::default());
/// assert!(handle.info("too early").is_err());
///
/// handle.initialise().unwrap();
/// handle.info("hello").unwrap();
/// ```
pub struct LoggerHandle {
    config: LoggerConfig,
    registry: Arc<LoggerRegistry>,
    bound: Option<BoundLogger>,
}

impl LoggerHandle {
    /// Handle backed by its own private registry.
    pub fn new(config: LoggerConfig) -> Self {
        Self::with_registry(config, LoggerRegistry::shared())
    }

    pub fn with_registry(config: LoggerConfig, registry: Arc<LoggerRegistry>) -> Self {
        Self {
            config,
            registry,
            bound: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.logger_name
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Mutable access to the configuration. Changes only take effect if made
    /// before the first [`initialise`](Self::initialise).
    pub fn config_mut(&mut self) -> &mut LoggerConfig {
        &mut self.config
    }

    pub fn registry(&self) -> &Arc<LoggerRegistry> {
        &self.registry
    }

    pub fn is_initialised(&self) -> bool {
        self.bound.is_some()
    }

    /// Set up the named logger and bind its processor chain.
    ///
    /// **Effects** (first call only)
    /// - validates the configuration,
    /// - sets the threshold of the registry's logger for this name,
    /// - clears whatever sink was attached and attaches exactly one: a
    ///   Graylog sink for `graylog`, a discard sink otherwise,
    /// - builds and binds the processor chain.
    pub fn initialise(&mut self) -> Result<BoundLogger> {
        if let Some(bound) = &self.bound {
            return Ok(bound.clone());
        }

        // everything fallible happens before the shared core logger is touched
        self.config.validate()?;
        let sink = make_sink_from_config(&self.config)?;

        let core = self.registry.get_logger(&self.config.logger_name);
        core.set_threshold(self.config.logging_level);
        if core.clear_sinks() {
            tracing::debug!(target: "fedlog", logger = %core.name(), "cleared previously attached sink");
        }
        core.attach(sink);

        let builder = ChainBuilder::from_config(&self.config);
        let chain = builder.build();
        let bound = BoundLogger {
            core,
            builder: Arc::new(builder),
            chain: Arc::new(chain),
        };

        tracing::debug!(
            target: "fedlog",
            logger = %self.config.logger_name,
            variant = %self.config.logging_variant,
            level = %self.config.logging_level,
            "logger initialised"
        );
        self.bound = Some(bound.clone());
        Ok(bound)
    }

    /// The bound logger, or a usage error before initialisation.
    pub fn bound(&self) -> Result<&BoundLogger> {
        self.bound.as_ref().ok_or_else(|| {
            UsageError::NotInitialised {
                logger: self.config.logger_name.clone(),
            }
            .into()
        })
    }

    pub fn capture(&self) -> Option<CaptureBuffer> {
        self.bound.as_ref().and_then(|b| b.capture().cloned())
    }

    #[track_caller]
    pub fn log(&self, level: Severity, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        let caller = Location::caller();
        self.bound()?.emit(level, call.into().located(caller))
    }

    #[track_caller]
    pub fn debug(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Debug, call)
    }

    #[track_caller]
    pub fn info(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Info, call)
    }

    #[track_caller]
    pub fn warning(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Warning, call)
    }

    #[track_caller]
    pub fn error(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Error, call)
    }

    #[track_caller]
    pub fn critical(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Critical, call)
    }
}

/// Ready-to-use emission handle: a core logger plus a bound processor chain.
///
/// Cheap to clone and `Send + Sync`. Concurrent emits are not ordered with
/// respect to each other.
#[derive(Clone)]
pub struct BoundLogger {
    core: Arc<CoreLogger>,
    builder: Arc<ChainBuilder>,
    chain: Arc<ProcessorChain>,
}

impl fmt::Debug for BoundLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundLogger")
            .field("name", &self.name())
            .field("threshold", &self.core.threshold())
            .field("chain", &self.chain)
            .finish()
    }
}

impl BoundLogger {
    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn core(&self) -> &Arc<CoreLogger> {
        &self.core
    }

    pub fn chain(&self) -> &Arc<ProcessorChain> {
        &self.chain
    }

    /// Builder the bound chain came from; reuse it to derive chains that
    /// render into the same place.
    pub fn builder(&self) -> &ChainBuilder {
        &self.builder
    }

    /// Same core logger, different chain.
    pub fn with_chain(&self, chain: ProcessorChain) -> BoundLogger {
        BoundLogger {
            core: Arc::clone(&self.core),
            builder: Arc::clone(&self.builder),
            chain: Arc::new(chain),
        }
    }

    pub fn capture(&self) -> Option<&CaptureBuffer> {
        self.chain.renderer().capture()
    }

    /// Run one call through the chain and hand the result to the sink.
    ///
    /// **Returns**
    /// - `Ok(Some(..))` with what was emitted.
    /// - `Ok(None)` if the record was filtered out (e.g. below threshold).
    /// - `Err(..)` on a reserved caller field or a broken stage; nothing is
    ///   emitted in that case.
    pub fn emit(&self, level: Severity, call: LogCall) -> Result<Option<Rendered>> {
        let record = call.into_record()?;
        let logger = LoggerRef {
            name: self.core.name(),
            threshold: self.core.threshold(),
        };
        let rendered = self.chain.run(&logger, level, record)?;
        if let Some(out) = &rendered {
            self.core.emit(out);
        }
        Ok(rendered)
    }

    #[track_caller]
    pub fn log(&self, level: Severity, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        let caller = Location::caller();
        self.emit(level, call.into().located(caller))
    }

    #[track_caller]
    pub fn debug(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Debug, call)
    }

    #[track_caller]
    pub fn info(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Info, call)
    }

    #[track_caller]
    pub fn warning(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Warning, call)
    }

    #[track_caller]
    pub fn error(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Error, call)
    }

    #[track_caller]
    pub fn critical(&self, call: impl Into<LogCall>) -> Result<Option<Rendered>> {
        self.log(Severity::Critical, call)
    }
}
