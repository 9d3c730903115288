use serde::Serialize;
use serde_json::{Map, Value};
use std::panic::Location;

use crate::error::PipelineError;

pub const EVENT: &str = "event";
pub const LOGGER: &str = "logger";
pub const LEVEL: &str = "level";
pub const LEVEL_NUMBER: &str = "level_number";
pub const TIMESTAMP: &str = "timestamp";
pub const FILE_PATH: &str = "file_path";

/// Keys populated by the pipeline itself. Caller fields may not use them.
pub const RESERVED_KEYS: [&str; 6] = [EVENT, LOGGER, LEVEL, LEVEL_NUMBER, TIMESTAMP, FILE_PATH];

/// Control keys consumed by the formatting stages.
pub const POSITIONAL_ARGS: &str = "positional_args";
pub const EXC_INFO: &str = "exc_info";
pub const STACK_INFO: &str = "stack_info";

/// The mutable field map threaded through a processor chain for one log call.
///
/// Serializes as a plain JSON object of its fields. Raw byte fields wait in a
/// side list until the decoding stage turns them into strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventRecord {
    fields: Map<String, Value>,
    #[serde(skip)]
    raw: Vec<(String, Vec<u8>)>,
    #[serde(skip)]
    caller: Option<&'static Location<'static>>,
}

impl EventRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Insert a field. The last write for a key wins.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// `event` as text, or an empty string when missing.
    pub fn event(&self) -> String {
        match self.fields.get(EVENT) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn push_bytes(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.raw.push((key.into(), bytes));
    }

    pub(crate) fn take_bytes(&mut self) -> Vec<(String, Vec<u8>)> {
        std::mem::take(&mut self.raw)
    }

    pub fn caller(&self) -> Option<&'static Location<'static>> {
        self.caller
    }

    /// Carry over byte fields and caller location from another record, used
    /// when a loosely-typed stage hands back a bare map.
    pub(crate) fn inherit_meta(&mut self, other: &mut EventRecord) {
        self.raw = other.take_bytes();
        self.caller = other.caller;
    }
}

impl From<Map<String, Value>> for EventRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_fields(fields)
    }
}

/// Python-style truthiness used by the censoring and control stages.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Arguments of a single log call, turned into a fresh [`EventRecord`].
///
/// ```
/// use fedlog::record::LogCall;
///
/// let call = LogCall::new("round {} finished").arg(3).field("loss", 0.25);
/// let record = call.into_record().unwrap();
/// assert_eq!(record.get("loss").unwrap(), 0.25);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogCall {
    event: String,
    fields: Map<String, Value>,
    args: Vec<Value>,
    exc_info: Option<Vec<String>>,
    stack_info: bool,
    raw: Vec<(String, Vec<u8>)>,
    caller: Option<&'static Location<'static>>,
}

impl LogCall {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn fields<K, V, I>(mut self, fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in fields {
            self.fields.insert(k.into(), v.into());
        }
        self
    }

    /// Positional argument substituted into a `{}` placeholder of the event.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Attach an error and its source chain.
    pub fn exception(mut self, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = vec![err.to_string()];
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        self.exc_info = Some(chain);
        self
    }

    /// Ask the pipeline to capture a backtrace into `stack`.
    pub fn stack_info(mut self) -> Self {
        self.stack_info = true;
        self
    }

    /// Raw bytes, decoded to text by the pipeline.
    pub fn bytes(mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.raw.push((key.into(), bytes.into()));
        self
    }

    pub(crate) fn located(mut self, caller: &'static Location<'static>) -> Self {
        if self.caller.is_none() {
            self.caller = Some(caller);
        }
        self
    }

    /// Build the record, rejecting caller fields that collide with
    /// [`RESERVED_KEYS`].
    pub fn into_record(self) -> Result<EventRecord, PipelineError> {
        let mut record = EventRecord::new();
        record.insert(EVENT, self.event);

        for (key, value) in self.fields {
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(PipelineError::ReservedField { key });
            }
            record.insert(key, value);
        }
        for (key, _) in &self.raw {
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(PipelineError::ReservedField { key: key.clone() });
            }
        }

        if !self.args.is_empty() {
            record.insert(POSITIONAL_ARGS, Value::Array(self.args));
        }
        if let Some(chain) = self.exc_info {
            record.insert(EXC_INFO, chain);
        }
        if self.stack_info {
            record.insert(STACK_INFO, true);
        }
        record.raw = self.raw;
        record.caller = self.caller;
        Ok(record)
    }
}

impl From<&str> for LogCall {
    fn from(event: &str) -> Self {
        LogCall::new(event)
    }
}

impl From<String> for LogCall {
    fn from(event: String) -> Self {
        LogCall::new(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_caller_fields_are_rejected() {
        let err = LogCall::new("x").field("logger", "spoof").into_record().unwrap_err();
        assert_eq!(err, PipelineError::ReservedField { key: "logger".into() });
    }

    #[test]
    fn control_fields_only_when_used() {
        let record = LogCall::new("plain").into_record().unwrap();
        assert_eq!(record.len(), 1);
        assert!(!record.contains_key(POSITIONAL_ARGS));

        let record = LogCall::new("{}").arg(1).stack_info().into_record().unwrap();
        assert_eq!(record.get(POSITIONAL_ARGS).unwrap(), &serde_json::json!([1]));
        assert_eq!(record.get(STACK_INFO).unwrap(), &Value::Bool(true));
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&serde_json::json!("")));
        assert!(!is_truthy(&serde_json::json!(0)));
        assert!(is_truthy(&serde_json::json!("secret")));
        assert!(is_truthy(&serde_json::json!(7)));
    }
}
