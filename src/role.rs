//! Role-specific loggers for a federated-learning cluster.
//!
//! Each role prefixes the caller's label to form the logger name and
//! publishes to its own Graylog input port by default, so every worker node
//! lands on the same `WORKER_PORT` input.

use std::fmt;
use std::sync::Arc;

use crate::config::{LoggerConfig, Variant};
use crate::level::Severity;
use crate::logger::LoggerHandle;
use crate::registry::LoggerRegistry;
use crate::stage::SharedProcessor;

pub const SYSMETRICS_PORT: u16 = 9100;
pub const DIRECTOR_PORT: u16 = 9200;
pub const TTP_PORT: u16 = 9300;
pub const WORKER_PORT: u16 = 9400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Orchestrator of the whole federation.
    Director,
    /// Trusted third party coordinating a training run.
    Coordinator,
    Worker,
    Sysmetrics,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Director, Role::Coordinator, Role::Worker, Role::Sysmetrics];

    pub fn prefix(self) -> &'static str {
        match self {
            Role::Director => "DIR",
            Role::Coordinator => "TTP",
            Role::Worker => "WKR",
            Role::Sysmetrics => "SYS",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Role::Director => DIRECTOR_PORT,
            Role::Coordinator => TTP_PORT,
            Role::Worker => WORKER_PORT,
            Role::Sysmetrics => SYSMETRICS_PORT,
        }
    }

    /// `<PREFIX>_<label>`
    pub fn logger_name(self, label: &str) -> String {
        format!("{}_{}", self.prefix(), label)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Builder for a role logger: a [`LoggerHandle`] whose name and default port
/// come from its [`Role`]. Defaults to the `graylog` variant.
///
/// ```
/// use fedlog::role::{Role, RoleLogger, WORKER_PORT};
///
/// let handle = RoleLogger::new(Role::Worker, "10.0.0.2", "worker_1").build();
/// assert_eq!(handle.name(), "WKR_worker_1");
/// assert_eq!(handle.config().port, Some(WORKER_PORT));
/// ```
pub struct RoleLogger {
    role: Role,
    config: LoggerConfig,
    registry: Option<Arc<LoggerRegistry>>,
}

impl RoleLogger {
    pub fn new(role: Role, server: impl Into<String>, label: &str) -> Self {
        let config = LoggerConfig::new(role.logger_name(label))
            .variant(Variant::Graylog)
            .server(server, role.default_port());
        Self {
            role,
            config,
            registry: None,
        }
    }

    pub fn director(server: impl Into<String>, label: &str) -> Self {
        Self::new(Role::Director, server, label)
    }

    pub fn coordinator(server: impl Into<String>, label: &str) -> Self {
        Self::new(Role::Coordinator, server, label)
    }

    pub fn worker(server: impl Into<String>, label: &str) -> Self {
        Self::new(Role::Worker, server, label)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.config.logging_variant = variant;
        self
    }

    pub fn level(mut self, level: Severity) -> Self {
        self.config.logging_level = level;
        self
    }

    pub fn debugging_fields(mut self, enabled: bool) -> Self {
        self.config.debugging_fields = enabled;
        self
    }

    pub fn filter(mut self, stage: SharedProcessor) -> Self {
        self.config.filter_functions.push(stage);
        self
    }

    pub fn censor<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.censor(keys);
        self
    }

    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.config.file_path = path.into();
        self
    }

    pub fn registry(mut self, registry: Arc<LoggerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn into_config(self) -> LoggerConfig {
        self.config
    }

    pub fn build(self) -> LoggerHandle {
        match self.registry {
            Some(registry) => LoggerHandle::with_registry(self.config, registry),
            None => LoggerHandle::new(self.config),
        }
    }
}
