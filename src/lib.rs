//! Structured logging for federated-learning clusters.
//!
//! Log calls become [`EventRecord`](record::EventRecord)s that run through an
//! ordered [`ProcessorChain`](chain::ProcessorChain) (logger name, level,
//! level filter, formatting, timestamp, caller filters, file path,
//! censoring) and end in a variant-specific renderer: indented JSON
//! (`basic`), a GELF payload shipped to Graylog (`graylog`) or an in-memory
//! capture (`test`). Role loggers fix name prefixes and Graylog ports per
//! cluster role, and [`SysmetricLogger`](sysmetrics::SysmetricLogger)
//! samples hardware counters in the background.

pub mod error;
pub mod level;
pub mod record;
pub mod stage;
pub mod render;
pub mod chain;
pub mod config;
pub mod env;
pub mod backend;
pub mod sink;
pub mod dispatch;

#[cfg(feature = "graylog")]
pub mod gelf;

pub mod registry;
pub mod logger;
pub mod role;
pub mod sysmetrics;
pub mod layer;
pub mod init;

pub use config::{LoggerConfig, Variant};
pub use error::{Error, Result};
pub use level::Severity;
pub use logger::{BoundLogger, LoggerHandle};
pub use record::LogCall;
pub use registry::LoggerRegistry;
pub use role::{Role, RoleLogger};
pub use sysmetrics::{SysmetricLogger, TrackTarget};
