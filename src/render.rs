use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::Variant;
use crate::level::Severity;
use crate::record::EventRecord;

/// Metadata fields always present in a GELF `extra` map.
pub const GELF_DEBUG_FIELDS: [&str; 5] = ["pid", "process_name", "thread_name", "file", "function"];

/// Terminal step of a processor chain. Its output shape differs per variant,
/// so it is held apart from the stage list and always runs last.
#[derive(Debug, Clone)]
pub enum Renderer {
    Text(TextRenderer),
    Wire(WireRenderer),
    Capture(CaptureRenderer),
}

/// What a renderer produced for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Text(String),
    Wire(GelfPayload),
    /// The record went into a [`CaptureBuffer`].
    Captured,
}

impl Renderer {
    pub fn for_variant(variant: Variant, include_debug_fields: bool) -> Self {
        match variant {
            Variant::Basic => Renderer::Text(TextRenderer),
            Variant::Graylog => Renderer::Wire(WireRenderer { include_debug_fields }),
            Variant::Test => Renderer::Capture(CaptureRenderer::default()),
        }
    }

    pub fn kind(&self) -> Variant {
        match self {
            Renderer::Text(_) => Variant::Basic,
            Renderer::Wire(_) => Variant::Graylog,
            Renderer::Capture(_) => Variant::Test,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Renderer::Text(_) => "json_renderer",
            Renderer::Wire(_) => "gelf_renderer",
            Renderer::Capture(_) => "log_capture",
        }
    }

    pub fn render(&self, method: Severity, record: EventRecord) -> Rendered {
        match self {
            Renderer::Text(r) => Rendered::Text(r.render(&record)),
            Renderer::Wire(r) => Rendered::Wire(r.render(method, record)),
            Renderer::Capture(r) => {
                r.buffer.push(record);
                Rendered::Captured
            }
        }
    }

    /// Capture buffer of a `test` renderer.
    pub fn capture(&self) -> Option<&CaptureBuffer> {
        match self {
            Renderer::Capture(r) => Some(&r.buffer),
            _ => None,
        }
    }
}

/// Indented JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl TextRenderer {
    pub fn render(&self, record: &EventRecord) -> String {
        serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".to_string())
    }
}

/// `(args, kwargs)` pair for a GELF handler: `args = (event,)`,
/// `kwargs = {"extra": record}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GelfPayload {
    pub level: Severity,
    pub args: (String,),
    pub kwargs: Map<String, Value>,
}

impl GelfPayload {
    pub fn message(&self) -> &str {
        &self.args.0
    }

    pub fn extra(&self) -> Option<&Map<String, Value>> {
        self.kwargs.get("extra").and_then(Value::as_object)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WireRenderer {
    pub include_debug_fields: bool,
}

impl WireRenderer {
    pub fn render(&self, method: Severity, record: EventRecord) -> GelfPayload {
        let event = record.event();
        let caller = record.caller();
        let mut extra = record.into_fields();

        for key in GELF_DEBUG_FIELDS {
            extra.insert(key.to_string(), Value::String(String::new()));
        }
        if self.include_debug_fields {
            extra.insert("pid".into(), Value::String(std::process::id().to_string()));
            extra.insert("process_name".into(), Value::String(process_name()));
            if let Some(name) = std::thread::current().name() {
                extra.insert("thread_name".into(), Value::String(name.to_string()));
            }
            if let Some(caller) = caller {
                extra.insert("file".into(), Value::String(caller.file().to_string()));
            }
        }

        let mut kwargs = Map::new();
        kwargs.insert("extra".into(), Value::Object(extra));
        GelfPayload {
            level: method,
            args: (event,),
            kwargs,
        }
    }
}

fn process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
pub struct CaptureRenderer {
    buffer: CaptureBuffer,
}

/// In-memory list of records captured by the `test` variant, shared by every
/// chain built for the same logger handle.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    entries: Arc<Mutex<Vec<EventRecord>>>,
}

impl CaptureBuffer {
    fn lock(&self) -> MutexGuard<'_, Vec<EventRecord>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, record: EventRecord) {
        self.lock().push(record);
    }

    /// Snapshot of the captured records, oldest first.
    pub fn entries(&self) -> Vec<EventRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogCall;

    #[test]
    fn wire_payload_forces_metadata_fields() {
        let record = LogCall::new("ping").field("x", 42).into_record().unwrap();
        let payload = WireRenderer::default().render(Severity::Info, record);
        assert_eq!(payload.args, ("ping".to_string(),));
        let extra = payload.extra().unwrap();
        assert_eq!(extra["x"], 42);
        for key in GELF_DEBUG_FIELDS {
            assert_eq!(extra[key], "");
        }
    }

    #[test]
    fn wire_payload_fills_pid_with_debug_fields() {
        let record = LogCall::new("ping").into_record().unwrap();
        let payload = WireRenderer { include_debug_fields: true }.render(Severity::Info, record);
        let extra = payload.extra().unwrap();
        assert_eq!(extra["pid"], std::process::id().to_string());
    }

    #[test]
    fn text_is_indented_json() {
        let record = LogCall::new("hello").into_record().unwrap();
        let text = TextRenderer.render(&record);
        assert!(text.contains('\n'));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["event"], "hello");
    }

    #[test]
    fn capture_shares_one_buffer_across_clones() {
        let renderer = Renderer::for_variant(Variant::Test, false);
        let clone = renderer.clone();
        clone.render(Severity::Info, LogCall::new("a").into_record().unwrap());
        assert_eq!(renderer.capture().unwrap().len(), 1);
    }
}
