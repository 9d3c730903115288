use crate::config::{LoggerConfig, Variant};
use crate::error::ConfigError;
use crate::sink::Sink;

/// Target parsed from a DSN string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub variant: Variant,
    pub server: Option<String>,
    pub port: Option<u16>,
    /// Raw DSN that was used to construct this config.
    pub dsn: String,
}

/// Parse a DSN string and infer the logging variant from its scheme.
///
/// Examples:
/// - "graylog://10.0.0.5:9400"
/// - "basic://"
/// - "test://127.0.0.1:12201"
pub fn parse_dsn(dsn: &str) -> Result<BackendConfig, DsnError> {
    let (scheme, rest) = dsn.split_once("://").ok_or(DsnError::UnknownScheme)?;
    let variant = match scheme.to_ascii_lowercase().as_str() {
        "graylog" | "gelf" | "gelf+tcp" => Variant::Graylog,
        "basic" => Variant::Basic,
        "test" => Variant::Test,
        _ => return Err(DsnError::UnknownScheme),
    };

    let authority = rest.split('/').next().unwrap_or("");
    if authority.is_empty() {
        if variant == Variant::Basic {
            return Ok(BackendConfig {
                variant,
                server: None,
                port: None,
                dsn: dsn.to_string(),
            });
        }
        return Err(DsnError::MissingHost);
    }

    let (host, port) = authority.rsplit_once(':').ok_or(DsnError::MissingPort)?;
    if host.is_empty() {
        return Err(DsnError::MissingHost);
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| DsnError::InvalidPort(port.to_string()))?;

    Ok(BackendConfig {
        variant,
        server: Some(host.to_string()),
        port: Some(port),
        dsn: dsn.to_string(),
    })
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,

    #[error("DSN has no host")]
    MissingHost,

    #[error("DSN has no port")]
    MissingPort,

    #[error("DSN port `{0}` is not a valid port")]
    InvalidPort(String),
}

impl BackendConfig {
    /// Overlay the DSN target onto a logger configuration.
    pub fn apply(&self, config: &mut LoggerConfig) {
        config.logging_variant = self.variant;
        if self.server.is_some() {
            config.server = self.server.clone();
        }
        if self.port.is_some() {
            config.port = self.port;
        }
    }
}

/// Create the sink a validated configuration asks for.
///
/// `graylog` spawns a [`Dispatcher`](crate::dispatch::Dispatcher) driving a
/// [`GelfTcpSink`](crate::gelf::GelfTcpSink) on the current tokio runtime;
/// every other variant discards.
pub fn make_sink_from_config(config: &LoggerConfig) -> Result<Sink, ConfigError> {
    match config.logging_variant {
        Variant::Graylog => {
            #[cfg(feature = "graylog")]
            {
                use crate::dispatch::Dispatcher;
                use std::sync::Arc;
                use crate::gelf::{GelfConfig, GelfTcpSink};

                let variant = config.logging_variant.as_str();
                let host = config
                    .server
                    .clone()
                    .ok_or(ConfigError::MissingServer { variant })?;
                let port = config.port.ok_or(ConfigError::MissingPort { variant })?;
                let sink = GelfTcpSink::new(GelfConfig {
                    host,
                    port,
                    source: None,
                });
                let dispatcher = Dispatcher::spawn(Arc::new(sink), config.channel_buffer)?;
                Ok(Sink::Remote(dispatcher))
            }

            #[cfg(not(feature = "graylog"))]
            {
                Err(ConfigError::GraylogFeatureDisabled)
            }
        }
        Variant::Basic => Ok(Sink::Discard {
            echo_stdout: config.enable_stdout,
        }),
        Variant::Test => Ok(Sink::discard()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_graylog_dsn() {
        let cfg = parse_dsn("graylog://10.0.0.5:9400").unwrap();
        assert_eq!(cfg.variant, Variant::Graylog);
        assert_eq!(cfg.server.as_deref(), Some("10.0.0.5"));
        assert_eq!(cfg.port, Some(9400));
    }

    #[test]
    fn basic_dsn_needs_no_address() {
        let cfg = parse_dsn("basic://").unwrap();
        assert_eq!(cfg.variant, Variant::Basic);
        assert!(cfg.server.is_none());
    }

    #[test]
    fn rejects_bad_dsns() {
        assert_eq!(parse_dsn("kafka://b/t"), Err(DsnError::UnknownScheme));
        assert_eq!(parse_dsn("graylog://"), Err(DsnError::MissingHost));
        assert_eq!(parse_dsn("graylog://host"), Err(DsnError::MissingPort));
        assert_eq!(
            parse_dsn("graylog://host:99999"),
            Err(DsnError::InvalidPort("99999".into()))
        );
    }

    #[test]
    fn basic_and_test_variants_discard() {
        let sink = make_sink_from_config(&LoggerConfig::default()).unwrap();
        assert_eq!(sink.kind(), "discard");
    }
}
