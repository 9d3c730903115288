//! Environment variable names used by this crate for convenient
//! configuration of loggers from cluster nodes.
//!
//! These are purely helpers; the logger types remain decoupled from
//! environment access.

use crate::backend::parse_dsn;
use crate::config::LoggerConfig;
use crate::error::ConfigError;

/// Logger identity, e.g. `WKR_worker_1`.
pub const FEDLOG_LOGGER_NAME_ENV: &str = "FEDLOG_LOGGER_NAME";

/// `basic`, `graylog` or `test`.
pub const FEDLOG_VARIANT_ENV: &str = "FEDLOG_VARIANT";

/// Graylog host address.
pub const FEDLOG_SERVER_ENV: &str = "FEDLOG_SERVER";

/// Graylog port.
pub const FEDLOG_PORT_ENV: &str = "FEDLOG_PORT";

/// Minimum severity, by name or number.
pub const FEDLOG_LEVEL_ENV: &str = "FEDLOG_LEVEL";

/// `true`/`false`, fills debugging fields in GELF payloads.
pub const FEDLOG_DEBUG_FIELDS_ENV: &str = "FEDLOG_DEBUG_FIELDS";

/// Comma separated list of keys to censor.
pub const FEDLOG_CENSOR_KEYS_ENV: &str = "FEDLOG_CENSOR_KEYS";

/// Path written into every record.
pub const FEDLOG_FILE_PATH_ENV: &str = "FEDLOG_FILE_PATH";

/// `graylog://host:port`; overrides variant, server and port.
pub const FEDLOG_DSN_ENV: &str = "FEDLOG_DSN";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Build a [`LoggerConfig`] from the process environment.
pub fn config_from_env() -> Result<LoggerConfig, ConfigError> {
    config_from_lookup(|key| std::env::var(key).ok())
}

/// Build a [`LoggerConfig`] from an arbitrary key lookup. Unset keys keep
/// their defaults.
pub fn config_from_lookup<F>(lookup: F) -> Result<LoggerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = LoggerConfig::default();

    if let Some(name) = lookup(FEDLOG_LOGGER_NAME_ENV) {
        config.logger_name = name;
    }
    if let Some(variant) = lookup(FEDLOG_VARIANT_ENV) {
        config.logging_variant = variant.parse()?;
    }
    if let Some(server) = lookup(FEDLOG_SERVER_ENV) {
        config.server = Some(server);
    }
    if let Some(port) = lookup(FEDLOG_PORT_ENV) {
        let parsed = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        config.port = Some(parsed);
    }
    if let Some(level) = lookup(FEDLOG_LEVEL_ENV) {
        config.logging_level = level.parse()?;
    }
    if let Some(flag) = lookup(FEDLOG_DEBUG_FIELDS_ENV) {
        config.debugging_fields = parse_bool(&flag)?;
    }
    if let Some(keys) = lookup(FEDLOG_CENSOR_KEYS_ENV) {
        config.censor_keys = keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(path) = lookup(FEDLOG_FILE_PATH_ENV) {
        config.file_path = path;
    }
    if let Some(dsn) = lookup(FEDLOG_DSN_ENV) {
        parse_dsn(&dsn)?.apply(&mut config);
    }

    Ok(config)
}

fn parse_bool(raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool(raw.to_string())),
    }
}
