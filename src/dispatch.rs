use crate::error::ConfigError;
use crate::render::Rendered;
use crate::sink::LogSink;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Forwards rendered records to an asynchronous [`LogSink`] via a bounded
/// channel and a background task.
///
/// Network I/O is fully decoupled from the logging thread. When the channel
/// is full the record is dropped and counted. Dropping the dispatcher closes
/// the channel; the task drains what is queued, flushes the sink and exits.
pub struct Dispatcher {
    sender: mpsc::Sender<Rendered>,
    /// Successfully enqueued into channel.
    pub enqueued: Arc<AtomicU64>,
    /// Dropped because the channel was full or closed.
    pub dropped: Arc<AtomicU64>,
    /// Accepted by the sink.
    pub delivered: Arc<AtomicU64>,
    /// Rejected by the sink.
    pub failed: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the forwarding task on the current tokio runtime.
    ///
    /// A minimal `buffer` of 16 is enforced.
    pub fn spawn(sink: Arc<dyn LogSink>, buffer: usize) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        let (tx, mut rx) = mpsc::channel::<Rendered>(buffer.max(16));

        let delivered = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));
        let delivered_bg = Arc::clone(&delivered);
        let failed_bg = Arc::clone(&failed);

        let task = runtime.spawn(async move {
            while let Some(rendered) = rx.recv().await {
                match sink.send(&rendered).await {
                    Ok(()) => {
                        delivered_bg.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        failed_bg.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(target: "fedlog", error = %e, "log sink send failed, record discarded");
                    }
                }
            }
            if let Err(e) = sink.flush().await {
                tracing::warn!(target: "fedlog", error = %e, "log sink flush failed");
            }
        });

        Ok(Self {
            sender: tx,
            enqueued: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            delivered,
            failed,
            task,
        })
    }

    pub fn dispatch(&self, rendered: Rendered) {
        match self.sender.try_send(rendered) {
            Ok(()) => {
                self.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "fedlog", "log channel full, dropping record");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::error::Error;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Rendered>>);

    #[async_trait]
    impl LogSink for Collect {
        async fn send(&self, rendered: &Rendered) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.0.lock().await.push(rendered.clone());
            Ok(())
        }
    }

    struct Refuse;

    #[async_trait]
    impl LogSink for Refuse {
        async fn send(&self, _: &Rendered) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("refused".into())
        }
    }

    async fn settle(counter: &AtomicU64, expected: u64) {
        for _ in 0..100 {
            if counter.load(Ordering::Relaxed) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn needs_a_runtime() {
        let sink: Arc<dyn LogSink> = Arc::new(Collect::default());
        assert!(matches!(Dispatcher::spawn(sink, 8), Err(ConfigError::NoRuntime)));
    }

    #[tokio::test]
    async fn forwards_in_order() {
        let collect = Arc::new(Collect::default());
        let dispatcher = Dispatcher::spawn(collect.clone(), 8).unwrap();
        dispatcher.dispatch(Rendered::Text("a".into()));
        dispatcher.dispatch(Rendered::Text("b".into()));
        settle(&dispatcher.delivered, 2).await;

        let seen = collect.0.lock().await.clone();
        assert_eq!(seen, vec![Rendered::Text("a".into()), Rendered::Text("b".into())]);
    }

    #[tokio::test]
    async fn failures_are_counted_not_retried() {
        let dispatcher = Dispatcher::spawn(Arc::new(Refuse), 8).unwrap();
        dispatcher.dispatch(Rendered::Captured);
        settle(&dispatcher.failed, 1).await;
        assert_eq!(dispatcher.failed.load(Ordering::Relaxed), 1);
        assert_eq!(dispatcher.delivered.load(Ordering::Relaxed), 0);
    }
}
