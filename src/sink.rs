use crate::dispatch::Dispatcher;
use crate::render::Rendered;
use async_trait::async_trait;
use std::error::Error;
use std::io::Write;

/// Asynchronous destination for rendered records.
///
/// Implementations are responsible for transporting payloads to a concrete
/// backend (Graylog, a custom collector, etc). They are driven by a
/// [`Dispatcher`] task and never awaited on the logging thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single rendered record to the underlying backend.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the backend.
    /// - `Err(..)` if the backend failed (connection refused, write error,
    ///   serialization error). The dispatcher reports it and moves on to
    ///   the next record; there is no retry.
    async fn send(&self, rendered: &Rendered) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered records, if the backend implements buffering.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// The single emission backend attached to a core logger.
pub enum Sink {
    /// Drops everything. With `echo_stdout`, text renders are printed first.
    Discard { echo_stdout: bool },
    /// Hands payloads to a background task owning a [`LogSink`].
    Remote(Dispatcher),
}

impl Sink {
    pub fn discard() -> Self {
        Sink::Discard { echo_stdout: false }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Sink::Discard { .. } => "discard",
            Sink::Remote(_) => "remote",
        }
    }

    pub fn emit(&self, rendered: &Rendered) {
        match self {
            Sink::Discard { echo_stdout: true } => {
                if let Rendered::Text(text) = rendered {
                    let mut out = std::io::stdout().lock();
                    let _ = writeln!(out, "{text}");
                }
            }
            Sink::Discard { echo_stdout: false } => {}
            Sink::Remote(dispatcher) => dispatcher.dispatch(rendered.clone()),
        }
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}
