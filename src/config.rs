use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::level::Severity;
use crate::stage::SharedProcessor;

/// Rendering/emission variant of a logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Indented JSON on a discard (or stdout) sink.
    #[default]
    Basic,
    /// GELF over TCP to a Graylog server.
    Graylog,
    /// Records captured in memory for inspection.
    Test,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Basic => "basic",
            Variant::Graylog => "graylog",
            Variant::Test => "test",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "default" => Ok(Variant::Basic),
            "graylog" => Ok(Variant::Graylog),
            "test" => Ok(Variant::Test),
            _ => Err(ConfigError::UnknownVariant(s.to_string())),
        }
    }
}

/// Configuration of a [`LoggerHandle`](crate::logger::LoggerHandle).
///
/// **Fields**
/// - `logger_name`: identity of the logger, e.g. `WKR_worker_1`.
/// - `logging_variant`: see [`Variant`].
/// - `server` / `port`: Graylog address; required unless the variant is
///   [`Variant::Basic`].
/// - `logging_level`: records below this severity are dropped.
/// - `debugging_fields`: fill `pid`, `process_name`, `thread_name` and `file`
///   in GELF payloads instead of leaving them empty.
/// - `filter_functions`: caller stages applied after the built-in ones, in
///   order. Not (de)serializable.
/// - `censor_keys`: fields replaced with `*CENSORED*` when truthy.
/// - `file_path`: written into every record as `file_path`.
/// - `enable_stdout`: print `basic` renders to stdout instead of discarding.
/// - `channel_buffer`: capacity of the hand-off channel to the remote sink.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub logger_name: String,
    pub logging_variant: Variant,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Severity,
    pub debugging_fields: bool,
    #[serde(skip)]
    pub filter_functions: Vec<SharedProcessor>,
    pub censor_keys: Vec<String>,
    pub file_path: String,
    pub enable_stdout: bool,
    pub channel_buffer: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            logger_name: "std_log".to_string(),
            logging_variant: Variant::Basic,
            server: None,
            port: None,
            logging_level: Severity::Info,
            debugging_fields: false,
            filter_functions: Vec::new(),
            censor_keys: Vec::new(),
            file_path: String::new(),
            enable_stdout: false,
            channel_buffer: 1024,
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<&str> = self.filter_functions.iter().map(|p| p.name()).collect();
        f.debug_struct("LoggerConfig")
            .field("logger_name", &self.logger_name)
            .field("logging_variant", &self.logging_variant)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("logging_level", &self.logging_level)
            .field("debugging_fields", &self.debugging_fields)
            .field("filter_functions", &filters)
            .field("censor_keys", &self.censor_keys)
            .field("file_path", &self.file_path)
            .field("enable_stdout", &self.enable_stdout)
            .field("channel_buffer", &self.channel_buffer)
            .finish()
    }
}

impl LoggerConfig {
    pub fn new(logger_name: impl Into<String>) -> Self {
        Self {
            logger_name: logger_name.into(),
            ..Self::default()
        }
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.logging_variant = variant;
        self
    }

    pub fn server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.server = Some(server.into());
        self.port = Some(port);
        self
    }

    pub fn level(mut self, level: Severity) -> Self {
        self.logging_level = level;
        self
    }

    pub fn debugging_fields(mut self, enabled: bool) -> Self {
        self.debugging_fields = enabled;
        self
    }

    pub fn filter(mut self, stage: SharedProcessor) -> Self {
        self.filter_functions.push(stage);
        self
    }

    pub fn censor<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.censor_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = path.into();
        self
    }

    pub fn enable_stdout(mut self, enabled: bool) -> Self {
        self.enable_stdout = enabled;
        self
    }

    /// Check that every non-basic variant has a server address and port.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging_variant == Variant::Basic {
            return Ok(());
        }
        let variant = self.logging_variant.as_str();
        if self.server.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingServer { variant });
        }
        if self.port.is_none() {
            return Err(ConfigError::MissingPort { variant });
        }
        Ok(())
    }
}
