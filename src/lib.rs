//! # marcdex: MARC record mapping for search indexing
//!
//! A library for converting structured bibliographic (MARC) records into
//! flat key/multi-value documents suitable for indexing into a search
//! engine.
//!
//! The engine has three layers:
//!
//! - a **declarative extraction language** (`"245abc"`, `"700|*4|bcd"`,
//!   `"008[35-37]"`) parsed into [`SpecSet`]s and applied by a cached,
//!   immutable [`MarcExtractor`] — including alternate-script (880)
//!   linkage;
//! - a **step pipeline** ([`StepPipeline`]) of validated field-mapping,
//!   whole-record and finalization steps executed against a per-record
//!   [`ExecutionContext`];
//! - a **concurrent runtime**: an [`Indexer`] drives reader -> worker pool
//!   -> writer with caller-runs backpressure ([`WorkPool`]) and deferred
//!   error collection.
//!
//! ## Quick start
//!
//! ```ignore
//! use marcdex::transforms::{extract_marc, ExtractMarcOptions};
//! use marcdex::{ArrayReader, ArrayWriter, Indexer, Input, Settings};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut indexer = Indexer::marc(Settings::new());
//! indexer.to_field("title", extract_marc("245ab", &ExtractMarcOptions::default())?)?;
//! indexer.to_field("language", extract_marc("008[35-37]", &ExtractMarcOptions::default())?)?;
//!
//! let writer = Arc::new(ArrayWriter::new());
//! let records = vec![/* parsed records */];
//! indexer.process(
//!     vec![Input::new("memory", ArrayReader::new(records))],
//!     writer.clone(),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`record`] — source record structures (`Record`, `Field`, `Subfield`)
//! - [`field_spec`] — the extraction mini-language parser
//! - [`field_linkage`] — 880 alternate-script linkage parsing
//! - [`extractor`] — spec matching and value extraction
//! - [`step`] — step types and registration-time validation
//! - [`pipeline`] — ordered step execution and merge semantics
//! - [`context`] — per-record execution state
//! - [`settings`] — layered key/value run configuration
//! - [`work_pool`] — bounded worker pool with caller-runs backpressure
//! - [`indexer`] — the orchestrator
//! - [`reader`] / [`writer`] — the external Reader/Writer capabilities
//! - [`transforms`] — ready-made step factories
//! - [`error`] — error types and result type

pub mod context;
pub mod error;
pub mod extractor;
pub mod field_linkage;
pub mod field_spec;
pub mod indexer;
pub mod pipeline;
pub mod reader;
/// Source record structures (`Record`, `Field`, `Subfield`)
pub mod record;
pub mod settings;
pub mod step;
pub mod transforms;
pub mod work_pool;
pub mod writer;

pub use context::{ContextState, ExecutionContext};
pub use error::{IndexerError, Result};
pub use extractor::{
    AlternateScript, ExtractorOptions, MarcExtractor, ALTERNATE_SCRIPT_TAG, LINKAGE_SUBFIELD,
};
pub use field_linkage::LinkageInfo;
pub use field_spec::{ByteSpan, FieldSpec, SpecSet};
pub use indexer::{Indexer, IndexerKind, Input};
pub use pipeline::{ErrorDisposition, ErrorHandling, PipelineConfig, StepPipeline};
pub use reader::{ArrayReader, RecordSource};
pub use record::{Field, FieldBuilder, Record, RecordBuilder, Subfield};
pub use settings::Settings;
pub use step::{
    Accumulator, Arity, FieldMappingStep, FieldProc, FinalizationStep, RecordProc, Step,
    WholeRecordStep,
};
pub use work_pool::{concurrency_disabled, disable_concurrency, enable_concurrency, WorkPool};
pub use writer::{ArrayWriter, DocumentSink};
