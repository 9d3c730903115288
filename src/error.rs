use crate::backend::DsnError;

/// Errors raised while validating or loading a [`LoggerConfig`].
///
/// These surface from [`LoggerHandle::initialise`] (or the config loaders),
/// never from the first emit.
///
/// [`LoggerConfig`]: crate::config::LoggerConfig
/// [`LoggerHandle::initialise`]: crate::logger::LoggerHandle::initialise
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("logging variant `{variant}` requires a server address")]
    MissingServer { variant: &'static str },

    #[error("logging variant `{variant}` requires a server port")]
    MissingPort { variant: &'static str },

    #[error("unknown logging variant `{0}` (expected basic, graylog or test)")]
    UnknownVariant(String),

    #[error("unknown logging level `{0}`")]
    UnknownLevel(String),

    #[error("invalid port `{0}`")]
    InvalidPort(String),

    #[error("invalid boolean `{0}`")]
    InvalidBool(String),

    #[error(transparent)]
    Dsn(#[from] DsnError),

    #[error("graylog feature is not enabled")]
    GraylogFeatureDisabled,

    #[error("graylog sink needs a running tokio runtime")]
    NoRuntime,
}

/// A stage broke the processor contract while handling a record.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("stage `{stage}` takes {found} parameter(s), expected {expected} (logger, method, record)")]
    WrongArity {
        stage: String,
        expected: usize,
        found: usize,
    },

    #[error("stage `{stage}` returned {found}, expected a record mapping")]
    WrongShape { stage: String, found: &'static str },

    #[error("field `{key}` is reserved and populated by the pipeline")]
    ReservedField { key: String },
}

/// Operations called in the wrong order.
#[derive(thiserror::Error, Debug)]
pub enum UsageError {
    #[error("logger `{logger}` was used before initialise()")]
    NotInitialised { logger: String },

    #[error("sysmetric logger `{logger}` is not tracking, nothing to terminate")]
    NotTracking { logger: String },

    #[error("sampler task for `{logger}` did not join cleanly: {reason}")]
    SamplerJoin { logger: String, reason: String },
}

/// Crate-level error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Usage(#[from] UsageError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
