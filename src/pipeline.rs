//! Ordered execution of registered steps against a per-record context.
//!
//! The [`StepPipeline`] owns the registered steps and the merge semantics
//! that fold each field-mapping step's accumulator into the context's
//! output document. Registration is fail-fast: an invalid step raises at
//! [`StepPipeline::register`], before any record is processed.
//!
//! During [`StepPipeline::execute`], a context already marked skipped
//! short-circuits all remaining steps. Errors raised by step callables are
//! caught at a per-record boundary and routed through the configured
//! [`ErrorHandling`] policy — loud by default, per-record recovery only by
//! explicit opt-in.

use crate::context::ExecutionContext;
use crate::error::{IndexerError, Result};
use crate::settings::Settings;
use crate::step::{Accumulator, FieldMappingStep, FinalizationStep, Step};
use std::fmt;

/// What the error handler decided to do with a failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Propagate the error and terminate the run.
    Fail,
    /// Skip just this record and continue the run.
    SkipRecord,
}

type ErrorHandlerFn =
    Box<dyn Fn(&mut ExecutionContext, &str, &anyhow::Error) -> ErrorDisposition + Send + Sync>;

/// Policy for errors raised by step callables while mapping one record.
pub enum ErrorHandling {
    /// Log a structured diagnostic and terminate the run. The default:
    /// correctness errors are loud.
    FailFast,
    /// Log and skip the offending record, continuing with the rest.
    SkipRecord,
    /// Delegate to a custom handler receiving
    /// `(context, step location, error)`.
    Custom(ErrorHandlerFn),
}

impl fmt::Debug for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorHandling::FailFast => write!(f, "FailFast"),
            ErrorHandling::SkipRecord => write!(f, "SkipRecord"),
            ErrorHandling::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Merge semantics and error policy for a pipeline.
///
/// Built from explicit overrides merged over [`Settings`] values merged
/// over the listed defaults, in that order.
#[derive(Debug)]
pub struct PipelineConfig {
    /// Keep blank (empty-string) values when merging. Default `false`.
    pub allow_blank_values: bool,
    /// Keep duplicate values within one output field. Default `false`.
    pub allow_duplicate_values: bool,
    /// Create the output key even when a step contributed nothing.
    /// Default `false`.
    pub allow_empty_fields: bool,
    /// Error policy for failing steps. Default [`ErrorHandling::FailFast`].
    pub error_handling: ErrorHandling,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            allow_blank_values: false,
            allow_duplicate_values: false,
            allow_empty_fields: false,
            error_handling: ErrorHandling::FailFast,
        }
    }
}

impl PipelineConfig {
    /// Read the merge-semantics flags from settings.
    ///
    /// `mapping_rescue = true` opts into per-record recovery
    /// ([`ErrorHandling::SkipRecord`]); anything else keeps the loud
    /// default. A custom handler can only be set in code, via
    /// [`PipelineConfig::with_error_handling`].
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let error_handling = if settings.get_bool("mapping_rescue", false) {
            ErrorHandling::SkipRecord
        } else {
            ErrorHandling::FailFast
        };
        PipelineConfig {
            allow_blank_values: settings.get_bool("allow_blank_values", false),
            allow_duplicate_values: settings.get_bool("allow_duplicate_values", false),
            allow_empty_fields: settings.get_bool("allow_empty_fields", false),
            error_handling,
        }
    }

    /// Replace the error policy.
    #[must_use]
    pub fn with_error_handling(mut self, handling: ErrorHandling) -> Self {
        self.error_handling = handling;
        self
    }
}

/// An ordered list of validated steps plus merge semantics.
#[derive(Debug, Default)]
pub struct StepPipeline {
    steps: Vec<Step>,
    finalizers: Vec<FinalizationStep>,
    config: PipelineConfig,
}

impl StepPipeline {
    /// Create an empty pipeline with default merge semantics.
    #[must_use]
    pub fn new() -> Self {
        StepPipeline::default()
    }

    /// Create an empty pipeline with the given configuration.
    #[must_use]
    pub fn with_config(config: PipelineConfig) -> Self {
        StepPipeline {
            steps: Vec::new(),
            finalizers: Vec::new(),
            config,
        }
    }

    /// Register a step, validating it immediately.
    ///
    /// Field-mapping and whole-record steps run per record in registration
    /// order; finalization steps run once after all records.
    ///
    /// # Errors
    ///
    /// Propagates [`IndexerError::Arity`] / [`IndexerError::Naming`] from
    /// [`Step::validate`]. Nothing is registered on error.
    pub fn register(&mut self, step: Step) -> Result<()> {
        step.validate()?;
        match step {
            Step::Finalization(finalizer) => self.finalizers.push(finalizer),
            other => self.steps.push(other),
        }
        Ok(())
    }

    /// Number of per-record steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no per-record steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run all per-record steps against a context.
    ///
    /// Stops early when the context is marked skipped. A failing step is
    /// routed through the configured error policy; `FailFast` (and a
    /// custom handler returning [`ErrorDisposition::Fail`]) surfaces the
    /// failure as [`IndexerError::Mapping`].
    ///
    /// # Errors
    ///
    /// [`IndexerError::Mapping`] when a step fails and the policy says
    /// fail, or when the context is not fresh.
    pub fn execute(&self, context: &mut ExecutionContext) -> Result<()> {
        context.begin_mapping()?;
        let record = context.record_shared();

        for step in &self.steps {
            if context.is_skipped() {
                break;
            }
            context.set_current_step(Some(step.location().to_string()));

            let result = match step {
                Step::FieldMapping(s) => self.run_field_step(s, &record, context),
                Step::WholeRecord(s) => s.proc.call(&record, context),
                // register() routes finalizers elsewhere.
                Step::Finalization(_) => Ok(()),
            };

            if let Err(err) = result {
                match self.dispose_error(context, step.location(), &err) {
                    ErrorDisposition::Fail => {
                        return Err(IndexerError::Mapping {
                            record: context.record_inspect(),
                            step: step.location().to_string(),
                            source: err,
                        });
                    }
                    ErrorDisposition::SkipRecord => {
                        context.skip(&format!("step {} failed: {err}", step.location()));
                    }
                }
            }
        }

        context.set_current_step(None);
        context.finish_mapping();
        Ok(())
    }

    /// Run all finalization steps in registration order.
    ///
    /// # Errors
    ///
    /// The first failing finalizer aborts with
    /// [`IndexerError::AfterProcessing`]; finalizer errors are always
    /// fatal.
    pub fn run_finalizers(&self) -> Result<()> {
        for finalizer in &self.finalizers {
            finalizer.call().map_err(|err| IndexerError::AfterProcessing {
                step: finalizer.location.clone(),
                source: err,
            })?;
        }
        Ok(())
    }

    fn run_field_step(
        &self,
        step: &FieldMappingStep,
        record: &crate::record::Record,
        context: &mut ExecutionContext,
    ) -> anyhow::Result<()> {
        let mut accumulator = Accumulator::new();
        for proc_ in &step.procs {
            proc_.call(record, &mut accumulator, context)?;
        }
        for name in &step.names {
            self.merge_into(context, name, accumulator.clone());
        }
        Ok(())
    }

    /// Fold a step's accumulator into the output document under one field
    /// name.
    fn merge_into(&self, context: &mut ExecutionContext, name: &str, mut values: Vec<String>) {
        if !self.config.allow_blank_values {
            values.retain(|v| !v.is_empty());
        }
        if values.is_empty() && !self.config.allow_empty_fields {
            return;
        }
        let field = context.output_mut().entry(name.to_string()).or_default();
        for value in values {
            if self.config.allow_duplicate_values || !field.contains(&value) {
                field.push(value);
            }
        }
    }

    fn dispose_error(
        &self,
        context: &mut ExecutionContext,
        location: &str,
        err: &anyhow::Error,
    ) -> ErrorDisposition {
        match &self.config.error_handling {
            ErrorHandling::FailFast => {
                log::error!(
                    "error mapping {}, step {location}: {err:#}",
                    context.record_inspect()
                );
                ErrorDisposition::Fail
            }
            ErrorHandling::SkipRecord => {
                log::warn!(
                    "skipping {} after failed step {location}: {err:#}",
                    context.record_inspect()
                );
                ErrorDisposition::SkipRecord
            }
            ErrorHandling::Custom(handler) => handler(context, location, err),
        }
    }
}
