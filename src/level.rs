use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Standard logging severities with their numeric levels.
///
/// Ordering follows the numeric level, so `Severity::Debug < Severity::Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Notset,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn number(self) -> u8 {
        match self {
            Severity::Notset => 0,
            Severity::Debug => 10,
            Severity::Info => 20,
            Severity::Warning => 30,
            Severity::Error => 40,
            Severity::Critical => 50,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Notset => "notset",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Syslog level as used by GELF.
    pub fn syslog(self) -> u8 {
        match self {
            Severity::Critical => 2,
            Severity::Error => 3,
            Severity::Warning => 4,
            Severity::Info => 6,
            Severity::Debug | Severity::Notset => 7,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Info
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    /// Accepts names in any case (`"INFO"`, `"warn"`) or numeric levels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notset" | "0" => Ok(Severity::Notset),
            "debug" | "10" => Ok(Severity::Debug),
            "info" | "20" => Ok(Severity::Info),
            "warning" | "warn" | "30" => Ok(Severity::Warning),
            "error" | "40" => Ok(Severity::Error),
            "critical" | "fatal" | "50" => Ok(Severity::Critical),
            _ => Err(ConfigError::UnknownLevel(s.to_string())),
        }
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warning,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("INFO".parse::<Severity>().unwrap(), Severity::Info);
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("40".parse::<Severity>().unwrap(), Severity::Error);
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn ordering_matches_numbers() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Critical > Severity::Error);
        assert_eq!(Severity::Warning.number(), 30);
    }
}
