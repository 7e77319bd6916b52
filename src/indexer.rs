//! The orchestrator driving reader -> pipeline -> writer.
//!
//! An [`Indexer`] is configured once (steps registered through
//! [`Indexer::to_field`] / [`Indexer::each_record`] /
//! [`Indexer::after_processing`], settings stored), then runs exactly one
//! full pass over its inputs with [`Indexer::process`]. Records are read
//! strictly sequentially and assigned 1-based positions in input order;
//! per-record mapping work is submitted to a [`WorkPool`] and may complete
//! out of order, so documents may reach the writer out of input order —
//! a writer needing strict order must buffer on position itself.
//!
//! After the last input is exhausted the pool is drained, any collected
//! error is re-raised, the writer is closed, finalization steps run, and
//! the return value reports soft failure: `Ok(true)` iff the writer
//! skipped nothing.

use crate::context::ExecutionContext;
use crate::error::{IndexerError, Result};
use crate::pipeline::{PipelineConfig, StepPipeline};
use crate::reader::RecordSource;
use crate::settings::Settings;
use crate::step::{FieldMappingStep, FieldProc, FinalizationStep, RecordProc, Step, WholeRecordStep};
use crate::work_pool::WorkPool;
use crate::writer::DocumentSink;
use std::sync::Arc;
use std::time::Instant;

/// Which family of defaults the indexer applies; selected at construction,
/// never a process-wide flag.
///
/// Currently this governs how the record identifier used in diagnostics is
/// derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexerKind {
    /// MARC conventions: the identifier comes from control field 001.
    #[default]
    Marc,
    /// No identifier extraction; diagnostics carry positions only.
    Basic,
}

/// Run state; one full run per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexerState {
    Fresh,
    Processing,
    Completed,
}

/// A named input stream.
pub struct Input {
    /// Label used in diagnostics and log lines (e.g. a file path).
    pub name: String,
    /// The record source; consumed completely, exactly once.
    pub source: Box<dyn RecordSource>,
}

impl Input {
    /// Wrap a record source with a diagnostic label.
    pub fn new(name: &str, source: impl RecordSource + 'static) -> Self {
        Input {
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

impl std::fmt::Debug for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Input").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Drives the full mapping run: reader -> context -> pipeline -> writer.
#[derive(Debug)]
pub struct Indexer {
    kind: IndexerKind,
    settings: Arc<Settings>,
    pipeline: StepPipeline,
    state: IndexerState,
}

impl Indexer {
    /// Create an indexer with the given kind and settings.
    ///
    /// Pipeline merge semantics are read from the settings at construction
    /// time (`allow_blank_values`, `allow_duplicate_values`,
    /// `allow_empty_fields`).
    #[must_use]
    pub fn new(kind: IndexerKind, settings: Settings) -> Self {
        let pipeline = StepPipeline::with_config(PipelineConfig::from_settings(&settings));
        Indexer {
            kind,
            settings: Arc::new(settings),
            pipeline,
            state: IndexerState::Fresh,
        }
    }

    /// Create a MARC indexer with the given settings.
    #[must_use]
    pub fn marc(settings: Settings) -> Self {
        Indexer::new(IndexerKind::Marc, settings)
    }

    /// Replace the pipeline configuration (merge semantics, error policy).
    ///
    /// Call before registering steps is not required, but must happen
    /// before [`Indexer::process`].
    pub fn set_pipeline_config(&mut self, config: PipelineConfig) {
        self.pipeline = StepPipeline::with_config(config);
    }

    /// The shared run settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register a field-mapping step contributing to one output field.
    ///
    /// # Errors
    ///
    /// Fails fast with [`IndexerError::Arity`] / [`IndexerError::Naming`]
    /// on an invalid step.
    #[track_caller]
    pub fn to_field(&mut self, name: &str, proc_: FieldProc) -> Result<()> {
        self.pipeline
            .register(Step::FieldMapping(FieldMappingStep::new(name, proc_)))
    }

    /// Register a field-mapping step fanning out to several output fields.
    ///
    /// # Errors
    ///
    /// Fails fast on an invalid step, as [`Indexer::to_field`].
    #[track_caller]
    pub fn to_fields(&mut self, names: &[&str], proc_: FieldProc) -> Result<()> {
        self.pipeline
            .register(Step::FieldMapping(FieldMappingStep::fan_out(names, proc_)))
    }

    /// Register a whole-record step.
    ///
    /// # Errors
    ///
    /// Fails fast with [`IndexerError::Arity`] on an invalid declared
    /// arity.
    #[track_caller]
    pub fn each_record(&mut self, proc_: RecordProc) -> Result<()> {
        self.pipeline
            .register(Step::WholeRecord(WholeRecordStep::new(proc_)))
    }

    /// Register a step run once after all records are processed.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible for registration symmetry.
    #[track_caller]
    pub fn after_processing<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pipeline
            .register(Step::Finalization(FinalizationStep::new(f)))
    }

    /// Run the full mapping pass over the given inputs.
    ///
    /// Returns `Ok(true)` when every document reached the writer,
    /// `Ok(false)` when the writer reports internally skipped records —
    /// the soft-failure signal callers turn into a non-zero exit code.
    ///
    /// # Errors
    ///
    /// [`IndexerError::CompletedState`] when invoked more than once; any
    /// fatal mapping, pool, reader, writer or finalizer error otherwise.
    pub fn process(&mut self, inputs: Vec<Input>, writer: Arc<dyn DocumentSink>) -> Result<bool> {
        if self.state != IndexerState::Fresh {
            return Err(IndexerError::CompletedState(
                "this indexer has already processed its inputs; readers and writers are \
                 exhausted. Build a new indexer for another run"
                    .to_string(),
            ));
        }
        self.state = IndexerState::Processing;

        let pipeline = Arc::new(std::mem::take(&mut self.pipeline));
        let pool_size = self.settings.get_usize("processing_thread_pool", 0);
        let batch_size = self.settings.get_usize("log.batch_size", 0);
        let mut pool = WorkPool::new(pool_size);

        log::info!(
            "beginning processing with {} steps, pool size {pool_size}",
            pipeline.len()
        );
        let run_start = Instant::now();
        let mut batch_start = Instant::now();
        let mut position = 0usize;

        for mut input in inputs {
            log::info!("processing input {}", input.name);
            let mut position_in_input = 0usize;

            while let Some(record) = input.source.read_record()? {
                position += 1;
                position_in_input += 1;

                let record_id = match self.kind {
                    IndexerKind::Marc => record.control_number().map(ToString::to_string),
                    IndexerKind::Basic => None,
                };
                let context = ExecutionContext::new(record, Arc::clone(&self.settings))
                    .with_position(position, position_in_input)
                    .with_input_name(&input.name)
                    .with_record_id(record_id);

                let pipeline = Arc::clone(&pipeline);
                let writer = Arc::clone(&writer);
                pool.maybe_in_pool(move || {
                    let mut context = context;
                    pipeline.execute(&mut context)?;
                    if context.is_skipped() {
                        log::debug!(
                            "skipped {}: {}",
                            context.record_inspect(),
                            context.skip_message().unwrap_or("")
                        );
                        Ok(())
                    } else {
                        writer.put(context)
                    }
                });
                pool.raise_collected_error()?;

                if batch_size > 0 && position % batch_size == 0 {
                    let rate = batch_size as f64 / batch_start.elapsed().as_secs_f64();
                    log::info!(
                        "processed {position} records; {rate:.0} records/sec this batch, \
                         {:.1}s elapsed",
                        run_start.elapsed().as_secs_f64()
                    );
                    batch_start = Instant::now();
                }
            }
        }

        let waited = pool.shutdown_and_wait();
        log::info!(
            "waited {:.2}s for workers to drain at shutdown",
            waited.as_secs_f64()
        );
        pool.raise_collected_error()?;

        writer.close()?;
        pipeline.run_finalizers()?;
        self.state = IndexerState::Completed;

        let skipped = writer.skipped_record_count();
        if skipped > 0 {
            log::error!("writer skipped {skipped} records");
        }
        log::info!(
            "finished processing {position} records in {:.1}s",
            run_start.elapsed().as_secs_f64()
        );
        Ok(skipped == 0)
    }
}
