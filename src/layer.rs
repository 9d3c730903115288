use crate::level::Severity;
use crate::logger::BoundLogger;
use crate::record::{LogCall, RESERVED_KEYS};
use serde_json::{Map, Value};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns `tracing` events into log calls on
/// a [`BoundLogger`], so they run through its processor chain and sink.
///
/// Events on the `fedlog` target (this crate's own diagnostics) are ignored. Event fields
/// that collide with reserved record keys are renamed to `field_<key>`.
pub struct PipelineLayer {
    logger: BoundLogger,
    min_level: Severity,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Emitted through the pipeline (including ones dropped by its filters).
    pub emitted_events: Arc<AtomicU64>,
    /// Rejected by a pipeline stage.
    pub failed_events: Arc<AtomicU64>,
}

impl PipelineLayer {
    pub fn new(logger: BoundLogger, min_level: Severity) -> Self {
        Self {
            logger,
            min_level,
            total_events: Arc::new(AtomicU64::new(0)),
            emitted_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if meta.target() == "fedlog" {
            return;
        }
        let level = Severity::from(*meta.level());
        if level < self.min_level {
            return;
        }

        let mut fields = Map::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let mut call = LogCall::new(message.unwrap_or_default()).field("target", meta.target());
        for (key, value) in fields {
            if RESERVED_KEYS.contains(&key.as_str()) {
                call = call.field(format!("field_{key}"), value);
            } else {
                call = call.field(key, value);
            }
        }

        match self.logger.emit(level, call) {
            Ok(_) => {
                self.emitted_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("fedlog: tracing event rejected by `{}`: {}", self.logger.name(), e);
            }
        }
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Map<String, Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}
