use crate::layer::PipelineLayer;
use crate::level::Severity;
use crate::logger::BoundLogger;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the `tracing` bridge.
///
/// **Fields**
/// - `min_level`: `tracing` events below this severity are not forwarded
///   (the logger's own threshold still applies afterwards).
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added next to [`PipelineLayer`] and every event is also printed.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub min_level: Severity,
    pub enable_stdout: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_level: Severity::Info,
            enable_stdout: false,
        }
    }
}

/// Install a global `tracing` subscriber that forwards events into
/// `logger`.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`PipelineLayer`] as the global
/// default subscriber, so `tracing::info!` and friends anywhere in the
/// process run through the logger's processor chain.
///
/// **Returns**
/// - `Err(..)` if a global subscriber was already set.
pub fn init_tracing_with_config(
    logger: BoundLogger,
    config: BridgeConfig,
) -> Result<(), SetGlobalDefaultError> {
    let layer = PipelineLayer::new(logger, config.min_level);

    // The two subscriber shapes have different types.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Equivalent to [`init_tracing_with_config`] with
/// [`BridgeConfig::default`].
pub fn init_tracing(logger: BoundLogger) -> Result<(), SetGlobalDefaultError> {
    init_tracing_with_config(logger, BridgeConfig::default())
}
