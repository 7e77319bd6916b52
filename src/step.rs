//! Pipeline step types and registration-time validation.
//!
//! A [`Step`] is one unit of mapping logic:
//!
//! - [`FieldMappingStep`] — contributes values to one or more named output
//!   fields through a sequence of callables receiving
//!   `(record, accumulator[, context])`.
//! - [`WholeRecordStep`] — a callable receiving `(record[, context])`, used
//!   for side effects and skip decisions; it contributes no accumulator.
//! - [`FinalizationStep`] — a zero-argument callable run once after all
//!   records are processed.
//!
//! Step callables arrive from a configuration layer that knows their shape,
//! so every proc carries a declared [`Arity`]. Validation happens at
//! registration ([`Step::validate`]): a bad arity or an empty field name is
//! an error *before* any record is processed, never at execution time.
//!
//! Every step records the source location that created it
//! (via [`std::panic::Location`]) for error attribution.

use crate::context::ExecutionContext;
use crate::error::{IndexerError, Result};
use crate::record::Record;
use std::fmt;

/// Ordered values a field-mapping step contributes before the merge into
/// the output document.
pub type Accumulator = Vec<String>;

/// Declared parameter count of a step callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// The callable takes exactly this many parameters.
    Fixed(u8),
    /// The callable accepts a variable number of parameters.
    Variable,
}

type FieldFn =
    Box<dyn Fn(&Record, &mut Accumulator, &mut ExecutionContext) -> anyhow::Result<()> + Send + Sync>;
type RecordFn = Box<dyn Fn(&Record, &mut ExecutionContext) -> anyhow::Result<()> + Send + Sync>;
type FinalFn = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A callable contributing to a field-mapping step.
pub struct FieldProc {
    arity: Arity,
    f: FieldFn,
}

impl FieldProc {
    /// Wrap a `(record, accumulator)` callable (arity 2).
    pub fn from_record_and_accumulator<F>(f: F) -> Self
    where
        F: Fn(&Record, &mut Accumulator) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        FieldProc {
            arity: Arity::Fixed(2),
            f: Box::new(move |record, acc, _ctx| f(record, acc)),
        }
    }

    /// Wrap a `(record, accumulator, context)` callable (arity 3).
    pub fn from_full<F>(f: F) -> Self
    where
        F: Fn(&Record, &mut Accumulator, &mut ExecutionContext) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        FieldProc {
            arity: Arity::Fixed(3),
            f: Box::new(f),
        }
    }

    /// Wrap a callable with an externally-declared arity.
    ///
    /// Used by configuration layers that construct procs dynamically; the
    /// declared arity is validated when the owning step is registered.
    pub fn from_parts<F>(arity: Arity, f: F) -> Self
    where
        F: Fn(&Record, &mut Accumulator, &mut ExecutionContext) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        FieldProc {
            arity,
            f: Box::new(f),
        }
    }

    /// The declared arity.
    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub(crate) fn call(
        &self,
        record: &Record,
        accumulator: &mut Accumulator,
        context: &mut ExecutionContext,
    ) -> anyhow::Result<()> {
        (self.f)(record, accumulator, context)
    }
}

impl fmt::Debug for FieldProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldProc").field("arity", &self.arity).finish_non_exhaustive()
    }
}

/// A callable backing a whole-record step.
pub struct RecordProc {
    arity: Arity,
    f: RecordFn,
}

impl RecordProc {
    /// Wrap a `(record)` callable (arity 1).
    pub fn from_record<F>(f: F) -> Self
    where
        F: Fn(&Record) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        RecordProc {
            arity: Arity::Fixed(1),
            f: Box::new(move |record, _ctx| f(record)),
        }
    }

    /// Wrap a `(record, context)` callable (arity 2).
    pub fn from_record_and_context<F>(f: F) -> Self
    where
        F: Fn(&Record, &mut ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        RecordProc {
            arity: Arity::Fixed(2),
            f: Box::new(f),
        }
    }

    /// Wrap a callable with an externally-declared arity.
    pub fn from_parts<F>(arity: Arity, f: F) -> Self
    where
        F: Fn(&Record, &mut ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        RecordProc {
            arity,
            f: Box::new(f),
        }
    }

    /// The declared arity.
    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub(crate) fn call(
        &self,
        record: &Record,
        context: &mut ExecutionContext,
    ) -> anyhow::Result<()> {
        (self.f)(record, context)
    }
}

impl fmt::Debug for RecordProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordProc").field("arity", &self.arity).finish_non_exhaustive()
    }
}

/// A step contributing values to one or more named output fields.
#[derive(Debug)]
pub struct FieldMappingStep {
    /// Output field name(s); more than one fans the same accumulator out
    /// to several fields.
    pub names: Vec<String>,
    /// Callables run in order against a fresh accumulator.
    pub procs: Vec<FieldProc>,
    /// Source location that created the step.
    pub location: String,
}

impl FieldMappingStep {
    /// Create a single-field step with one callable.
    #[track_caller]
    #[must_use]
    pub fn new(name: &str, proc_: FieldProc) -> Self {
        FieldMappingStep {
            names: vec![name.to_string()],
            procs: vec![proc_],
            location: caller_location(),
        }
    }

    /// Create a step fanning out to several field names.
    #[track_caller]
    #[must_use]
    pub fn fan_out(names: &[&str], proc_: FieldProc) -> Self {
        FieldMappingStep {
            names: names.iter().map(ToString::to_string).collect(),
            procs: vec![proc_],
            location: caller_location(),
        }
    }

    /// Append an additional callable run after the existing ones.
    #[must_use]
    pub fn with_proc(mut self, proc_: FieldProc) -> Self {
        self.procs.push(proc_);
        self
    }
}

/// A step run once per record for side effects or skip decisions.
#[derive(Debug)]
pub struct WholeRecordStep {
    /// The callable.
    pub proc: RecordProc,
    /// Source location that created the step.
    pub location: String,
}

impl WholeRecordStep {
    /// Create a whole-record step.
    #[track_caller]
    #[must_use]
    pub fn new(proc_: RecordProc) -> Self {
        WholeRecordStep {
            proc: proc_,
            location: caller_location(),
        }
    }
}

/// A step run once after all records have been processed.
pub struct FinalizationStep {
    f: FinalFn,
    /// Source location that created the step.
    pub location: String,
}

impl FinalizationStep {
    /// Create a finalization step from a zero-argument callable.
    #[track_caller]
    #[must_use]
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        FinalizationStep {
            f: Box::new(f),
            location: caller_location(),
        }
    }

    pub(crate) fn call(&self) -> anyhow::Result<()> {
        (self.f)()
    }
}

impl fmt::Debug for FinalizationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizationStep")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// One unit of registered mapping logic.
#[derive(Debug)]
pub enum Step {
    /// Contributes values to named output fields.
    FieldMapping(FieldMappingStep),
    /// Side effects / skip decisions only.
    WholeRecord(WholeRecordStep),
    /// Runs once after all records.
    Finalization(FinalizationStep),
}

impl Step {
    /// Source location that created the step.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Step::FieldMapping(s) => &s.location,
            Step::WholeRecord(s) => &s.location,
            Step::Finalization(s) => &s.location,
        }
    }

    /// Validate the step's names and declared arities.
    ///
    /// Called at registration; failures here surface before any record is
    /// processed.
    ///
    /// # Errors
    ///
    /// [`IndexerError::Naming`] for a field-mapping step with no usable
    /// field name; [`IndexerError::Arity`] for a callable whose declared
    /// arity the step kind does not support (field-mapping: 2, 3 or
    /// variable; whole-record: 1, 2 or variable).
    pub fn validate(&self) -> Result<()> {
        match self {
            Step::FieldMapping(s) => {
                if s.names.is_empty() || s.names.iter().any(|n| n.trim().is_empty()) {
                    return Err(IndexerError::Naming(format!(
                        "field-mapping step at {} requires a non-empty field name",
                        s.location
                    )));
                }
                for proc_ in &s.procs {
                    match proc_.arity() {
                        Arity::Fixed(2 | 3) | Arity::Variable => {}
                        Arity::Fixed(n) => {
                            return Err(IndexerError::Arity(format!(
                                "field-mapping step at {} takes a callable of 2 or 3 \
                                 parameters, got {n}",
                                s.location
                            )));
                        }
                    }
                }
                Ok(())
            }
            Step::WholeRecord(s) => match s.proc.arity() {
                Arity::Fixed(1 | 2) | Arity::Variable => Ok(()),
                Arity::Fixed(n) => Err(IndexerError::Arity(format!(
                    "whole-record step at {} takes a callable of 1 or 2 parameters, got {n}",
                    s.location
                ))),
            },
            Step::Finalization(_) => Ok(()),
        }
    }
}

#[track_caller]
fn caller_location() -> String {
    let loc = std::panic::Location::caller();
    format!("{}:{}", loc.file(), loc.line())
}
