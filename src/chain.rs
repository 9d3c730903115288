use std::fmt;
use std::sync::Arc;

use crate::config::{LoggerConfig, Variant};
use crate::error::PipelineError;
use crate::level::Severity;
use crate::record::EventRecord;
use crate::render::{Rendered, Renderer};
use crate::stage::{
    AddFilePath, AddLogLevel, AddLogLevelNumber, AddLoggerName, Censor, FilterByLevel, Flow,
    FormatExcInfo, LoggerRef, PositionalArgumentsFormatter, SharedProcessor, StackInfoRenderer,
    TimeStamper, UnicodeDecoder,
};

/// Ordered stages followed by a renderer.
///
/// A stage returning [`Flow::Drop`] short-circuits the chain and nothing
/// downstream runs, the renderer included.
#[derive(Clone)]
pub struct ProcessorChain {
    stages: Vec<SharedProcessor>,
    renderer: Renderer,
}

impl ProcessorChain {
    pub fn stages(&self) -> &[SharedProcessor] {
        &self.stages
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Names of every step in execution order; the renderer is the last one.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(self.renderer.name()))
            .collect()
    }

    /// Run `record` through every stage then the renderer.
    ///
    /// **Returns**
    /// - `Ok(Some(..))` with the rendered output.
    /// - `Ok(None)` if a stage dropped the record.
    /// - `Err(..)` if a stage broke its contract.
    pub fn run(
        &self,
        logger: &LoggerRef<'_>,
        method: Severity,
        mut record: EventRecord,
    ) -> Result<Option<Rendered>, PipelineError> {
        for stage in &self.stages {
            record = match stage.process(logger, method, record)? {
                Flow::Continue(next) => next,
                Flow::Drop => return Ok(None),
            };
        }
        Ok(Some(self.renderer.render(method, record)))
    }
}

impl fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

/// Assembles processor chains for one logger configuration.
///
/// The builder owns the renderer, so chains rebuilt with different filter
/// stages still render (and, for `test`, capture) into the same place.
#[derive(Clone)]
pub struct ChainBuilder {
    filters: Vec<SharedProcessor>,
    censor_keys: Vec<String>,
    file_path: String,
    renderer: Renderer,
}

impl ChainBuilder {
    pub fn new(variant: Variant, include_debug_fields: bool) -> Self {
        Self {
            filters: Vec::new(),
            censor_keys: Vec::new(),
            file_path: String::new(),
            renderer: Renderer::for_variant(variant, include_debug_fields),
        }
    }

    pub fn from_config(config: &LoggerConfig) -> Self {
        Self::new(config.logging_variant, config.debugging_fields)
            .filters(config.filter_functions.clone())
            .censor_keys(config.censor_keys.clone())
            .file_path(config.file_path.clone())
    }

    pub fn filters(mut self, filters: Vec<SharedProcessor>) -> Self {
        self.filters = filters;
        self
    }

    pub fn censor_keys(mut self, keys: Vec<String>) -> Self {
        self.censor_keys = keys;
        self
    }

    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = path.into();
        self
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn build(&self) -> ProcessorChain {
        self.build_with(Vec::new())
    }

    /// Build a chain with `extra` filters placed ahead of the configured
    /// caller filters.
    pub fn build_with(&self, extra: Vec<SharedProcessor>) -> ProcessorChain {
        let mut stages: Vec<SharedProcessor> = vec![
            Arc::new(AddLoggerName),
            Arc::new(AddLogLevel),
            Arc::new(AddLogLevelNumber),
            Arc::new(FilterByLevel),
            Arc::new(PositionalArgumentsFormatter),
            Arc::new(FormatExcInfo),
            Arc::new(TimeStamper::default()),
            Arc::new(StackInfoRenderer),
            Arc::new(UnicodeDecoder),
        ];
        stages.extend(extra);
        stages.extend(self.filters.iter().cloned());
        stages.push(Arc::new(AddFilePath::new(self.file_path.clone())));
        // censoring sees every field, including ones added by filters
        stages.push(Arc::new(Censor::new(self.censor_keys.clone())));

        ProcessorChain {
            stages,
            renderer: self.renderer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogCall;
    use crate::stage::FnFilter;

    const LOGGER_REF: LoggerRef<'static> = LoggerRef {
        name: "std_log",
        threshold: Severity::Info,
    };

    #[test]
    fn renderer_is_last_for_every_variant() {
        for (variant, name) in [
            (Variant::Basic, "json_renderer"),
            (Variant::Graylog, "gelf_renderer"),
            (Variant::Test, "log_capture"),
        ] {
            let chain = ChainBuilder::new(variant, false).build();
            assert_eq!(chain.renderer().kind(), variant);
            assert_eq!(chain.stage_names().last().copied(), Some(name));
        }
    }

    #[test]
    fn stage_order_is_fixed() {
        let chain = ChainBuilder::new(Variant::Basic, false)
            .filters(vec![FnFilter::shared("mine", |_, _, r| r)])
            .build();
        assert_eq!(
            chain.stage_names(),
            vec![
                "add_logger_name",
                "add_log_level",
                "add_log_level_number",
                "filter_by_level",
                "positional_arguments_formatter",
                "format_exc_info",
                "time_stamper",
                "stack_info_renderer",
                "unicode_decoder",
                "mine",
                "add_file_path",
                "censor",
                "json_renderer",
            ]
        );
    }

    #[test]
    fn extra_filters_run_before_configured_ones() {
        let chain = ChainBuilder::new(Variant::Test, false)
            .filters(vec![FnFilter::shared("caller", |_, _, r| r)])
            .build_with(vec![FnFilter::shared("builtin", |_, _, r| r)]);
        let names = chain.stage_names();
        let builtin = names.iter().position(|n| *n == "builtin").unwrap();
        let caller = names.iter().position(|n| *n == "caller").unwrap();
        assert!(builtin < caller);
    }

    #[test]
    fn dropped_records_never_reach_the_renderer() {
        let chain = ChainBuilder::new(Variant::Test, false).build();
        let record = LogCall::new("noise").into_record().unwrap();
        let out = chain.run(&LOGGER_REF, Severity::Debug, record).unwrap();
        assert!(out.is_none());
        assert!(chain.renderer().capture().unwrap().is_empty());
    }

    #[test]
    fn filters_can_be_censored() {
        let chain = ChainBuilder::new(Variant::Test, false)
            .filters(vec![FnFilter::shared("secret", |_, _, mut r| {
                r.insert("api_key", "abc");
                r
            })])
            .censor_keys(vec!["api_key".into()])
            .build();
        chain
            .run(&LOGGER_REF, Severity::Info, LogCall::new("x").into_record().unwrap())
            .unwrap();
        let captured = chain.renderer().capture().unwrap().entries();
        assert_eq!(captured[0].get("api_key").unwrap(), crate::stage::CENSOR);
    }
}
