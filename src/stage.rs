use chrono::Utc;
use serde_json::Value;
use std::backtrace::Backtrace;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::level::Severity;
use crate::record::{
    is_truthy, EventRecord, EVENT, EXC_INFO, FILE_PATH, LEVEL, LEVEL_NUMBER, LOGGER,
    POSITIONAL_ARGS, STACK_INFO, TIMESTAMP,
};

/// Timestamp format written by [`TimeStamper`] by default.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M.%S";

/// Replacement written over censored values.
pub const CENSOR: &str = "*CENSORED*";

/// The logger a record is being processed for.
#[derive(Debug, Clone, Copy)]
pub struct LoggerRef<'a> {
    pub name: &'a str,
    pub threshold: Severity,
}

/// Outcome of a stage: keep going with the (possibly modified) record, or
/// drop it silently.
#[derive(Debug)]
pub enum Flow {
    Continue(EventRecord),
    Drop,
}

/// A single transformation step of a processor chain.
///
/// Every stage must hand back a record so the next one can consume it; the
/// terminal rendering step is not a `Processor` (see [`crate::render`]).
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn process(
        &self,
        logger: &LoggerRef<'_>,
        method: Severity,
        record: EventRecord,
    ) -> Result<Flow, PipelineError>;
}

pub type SharedProcessor = Arc<dyn Processor>;

pub struct AddLoggerName;

impl Processor for AddLoggerName {
    fn name(&self) -> &str {
        "add_logger_name"
    }

    fn process(
        &self,
        logger: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        record.insert(LOGGER, logger.name);
        Ok(Flow::Continue(record))
    }
}

pub struct AddLogLevel;

impl Processor for AddLogLevel {
    fn name(&self) -> &str {
        "add_log_level"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        method: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        record.insert(LEVEL, method.name());
        Ok(Flow::Continue(record))
    }
}

pub struct AddLogLevelNumber;

impl Processor for AddLogLevelNumber {
    fn name(&self) -> &str {
        "add_log_level_number"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        method: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        record.insert(LEVEL_NUMBER, method.number());
        Ok(Flow::Continue(record))
    }
}

/// Drops records below the logger's threshold.
pub struct FilterByLevel;

impl Processor for FilterByLevel {
    fn name(&self) -> &str {
        "filter_by_level"
    }

    fn process(
        &self,
        logger: &LoggerRef<'_>,
        method: Severity,
        record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        if method < logger.threshold {
            Ok(Flow::Drop)
        } else {
            Ok(Flow::Continue(record))
        }
    }
}

/// Substitutes `positional_args` into `{}` placeholders of the event, in
/// order. Unmatched placeholders stay, surplus arguments are ignored.
pub struct PositionalArgumentsFormatter;

impl Processor for PositionalArgumentsFormatter {
    fn name(&self) -> &str {
        "positional_arguments_formatter"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        let args = match record.remove(POSITIONAL_ARGS) {
            Some(Value::Array(args)) => args,
            Some(Value::Null) | None => return Ok(Flow::Continue(record)),
            Some(single) => vec![single],
        };

        let template = record.event();
        let mut out = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut rest = template.as_str();
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(Value::String(s)) => out.push_str(s),
                Some(other) => out.push_str(&other.to_string()),
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);

        record.insert(EVENT, out);
        Ok(Flow::Continue(record))
    }
}

/// Turns `exc_info` (an error chain) into an `exception` text field.
pub struct FormatExcInfo;

impl Processor for FormatExcInfo {
    fn name(&self) -> &str {
        "format_exc_info"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        let Some(info) = record.remove(EXC_INFO) else {
            return Ok(Flow::Continue(record));
        };
        if !is_truthy(&info) {
            return Ok(Flow::Continue(record));
        }

        let text = match info {
            Value::Array(chain) => chain
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let msg = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    if i == 0 {
                        msg
                    } else {
                        format!("caused by: {msg}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Value::String(s) => s,
            other => other.to_string(),
        };
        record.insert("exception", text);
        Ok(Flow::Continue(record))
    }
}

pub struct TimeStamper {
    fmt: String,
}

impl TimeStamper {
    pub fn new(fmt: impl Into<String>) -> Self {
        Self { fmt: fmt.into() }
    }
}

impl Default for TimeStamper {
    fn default() -> Self {
        Self::new(TIMESTAMP_FORMAT)
    }
}

impl Processor for TimeStamper {
    fn name(&self) -> &str {
        "time_stamper"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        record.insert(TIMESTAMP, Utc::now().format(&self.fmt).to_string());
        Ok(Flow::Continue(record))
    }
}

pub struct StackInfoRenderer;

impl Processor for StackInfoRenderer {
    fn name(&self) -> &str {
        "stack_info_renderer"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        if record.remove(STACK_INFO).as_ref().is_some_and(is_truthy) {
            record.insert("stack", Backtrace::force_capture().to_string());
        }
        Ok(Flow::Continue(record))
    }
}

/// Decodes pending raw byte fields into (lossy) UTF-8 strings.
pub struct UnicodeDecoder;

impl Processor for UnicodeDecoder {
    fn name(&self) -> &str {
        "unicode_decoder"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        for (key, bytes) in record.take_bytes() {
            record.insert(key, String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(Flow::Continue(record))
    }
}

pub struct AddFilePath {
    path: String,
}

impl AddFilePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Processor for AddFilePath {
    fn name(&self) -> &str {
        "add_file_path"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        record.insert(FILE_PATH, self.path.as_str());
        Ok(Flow::Continue(record))
    }
}

/// Replaces truthy values of the configured keys with [`CENSOR`].
pub struct Censor {
    keys: Vec<String>,
}

impl Censor {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }
}

impl Processor for Censor {
    fn name(&self) -> &str {
        "censor"
    }

    fn process(
        &self,
        _: &LoggerRef<'_>,
        _: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        for key in &self.keys {
            if record.get(key).is_some_and(is_truthy) {
                record.insert(key.as_str(), CENSOR);
            }
        }
        Ok(Flow::Continue(record))
    }
}

type FilterFn = dyn Fn(&LoggerRef<'_>, Severity, EventRecord) -> EventRecord + Send + Sync;

/// Caller filter backed by a typed closure.
///
/// ```
/// use fedlog::stage::FnFilter;
///
/// let tag = FnFilter::new("tag_round", |_, _, mut record| {
///     record.insert("round", 3);
///     record
/// });
/// ```
pub struct FnFilter {
    name: String,
    f: Box<FilterFn>,
}

impl FnFilter {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&LoggerRef<'_>, Severity, EventRecord) -> EventRecord + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }

    pub fn shared<F>(name: impl Into<String>, f: F) -> SharedProcessor
    where
        F: Fn(&LoggerRef<'_>, Severity, EventRecord) -> EventRecord + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

impl Processor for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &self,
        logger: &LoggerRef<'_>,
        method: Severity,
        record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        Ok(Flow::Continue((self.f)(logger, method, record)))
    }
}

type DynFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// Caller filter backed by a loosely-typed callable, for filters assembled
/// at runtime (plugins, embedded scripting).
///
/// The callable receives `[logger, method, record]` as JSON values and must
/// take exactly three parameters and return an object. Anything else fails
/// the emit that reaches it.
pub struct DynFilter {
    name: String,
    arity: usize,
    f: Box<DynFn>,
}

impl DynFilter {
    pub const EXPECTED_ARITY: usize = 3;

    pub fn new<F>(name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            f: Box::new(f),
        }
    }
}

impl Processor for DynFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &self,
        logger: &LoggerRef<'_>,
        method: Severity,
        mut record: EventRecord,
    ) -> Result<Flow, PipelineError> {
        if self.arity != Self::EXPECTED_ARITY {
            return Err(PipelineError::WrongArity {
                stage: self.name.clone(),
                expected: Self::EXPECTED_ARITY,
                found: self.arity,
            });
        }

        let args = [
            Value::String(logger.name.to_string()),
            Value::String(method.name().to_string()),
            Value::Object(record.fields().clone()),
        ];
        let args = &args[..self.arity];
        match (self.f)(args) {
            Value::Object(fields) => {
                let mut next = EventRecord::from_fields(fields);
                next.inherit_meta(&mut record);
                Ok(Flow::Continue(next))
            }
            other => Err(PipelineError::WrongShape {
                stage: self.name.clone(),
                found: value_kind(&other),
            }),
        }
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogCall;
    use serde_json::json;

    const LOGGER_REF: LoggerRef<'static> = LoggerRef {
        name: "std_log",
        threshold: Severity::Info,
    };

    fn run(stage: &dyn Processor, record: EventRecord) -> EventRecord {
        match stage.process(&LOGGER_REF, Severity::Info, record).unwrap() {
            Flow::Continue(r) => r,
            Flow::Drop => panic!("record dropped"),
        }
    }

    #[test]
    fn filter_by_level_drops_below_threshold() {
        let record = LogCall::new("quiet").into_record().unwrap();
        let flow = FilterByLevel.process(&LOGGER_REF, Severity::Debug, record).unwrap();
        assert!(matches!(flow, Flow::Drop));
    }

    #[test]
    fn positional_args_fill_placeholders_in_order() {
        let record = LogCall::new("{} of {} done, {}").arg(3).arg("ten").into_record().unwrap();
        let out = run(&PositionalArgumentsFormatter, record);
        assert_eq!(out.event(), "3 of ten done, {}");
        assert!(!out.contains_key(POSITIONAL_ARGS));
    }

    #[test]
    fn exc_info_becomes_exception_text() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let record = LogCall::new("failed").exception(&err).into_record().unwrap();
        let out = run(&FormatExcInfo, record);
        assert_eq!(out.get("exception").unwrap(), "disk gone");
        assert!(!out.contains_key(EXC_INFO));
    }

    #[test]
    fn timestamp_uses_fixed_format() {
        let out = run(&TimeStamper::default(), EventRecord::new());
        let ts = out.get(TIMESTAMP).and_then(Value::as_str).unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn decoder_turns_bytes_into_text() {
        let record = LogCall::new("raw").bytes("payload", b"caf\xc3\xa9".to_vec()).into_record().unwrap();
        let out = run(&UnicodeDecoder, record);
        assert_eq!(out.get("payload").unwrap(), "café");
    }

    #[test]
    fn censor_only_touches_truthy_listed_keys() {
        let mut record = EventRecord::new();
        record.insert("password", "hunter2");
        record.insert("token", "");
        record.insert("user", "alice");
        let out = run(&Censor::new(vec!["password".into(), "token".into(), "missing".into()]), record);
        assert_eq!(out.get("password").unwrap(), CENSOR);
        assert_eq!(out.get("token").unwrap(), "");
        assert_eq!(out.get("user").unwrap(), "alice");
        assert!(!out.contains_key("missing"));
    }

    #[test]
    fn dyn_filter_checks_arity_and_shape() {
        let one_param = DynFilter::new("one_param", 1, |args| args[0].clone());
        let err = one_param.process(&LOGGER_REF, Severity::Info, EventRecord::new()).unwrap_err();
        assert!(matches!(err, PipelineError::WrongArity { found: 1, .. }));

        let stringly = DynFilter::new("stringly", 3, |_| json!("oops"));
        let err = stringly.process(&LOGGER_REF, Severity::Info, EventRecord::new()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::WrongShape { stage: "stringly".into(), found: "a string" }
        );

        let ok = DynFilter::new("ok", 3, |args| {
            let mut record = args[2].clone();
            record["is_valid"] = json!(true);
            record
        });
        let out = run(&ok, EventRecord::new());
        assert_eq!(out.get("is_valid").unwrap(), &json!(true));
    }
}
