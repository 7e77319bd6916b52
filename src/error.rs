//! Error types for record-mapping operations.
//!
//! This module provides the [`IndexerError`] type for all mapping engine
//! operations and the [`Result`] convenience type.
//!
//! The taxonomy follows the engine's propagation policy: specification and
//! registration errors are raised before any record is processed, per-record
//! mapping errors carry enough context to identify the offending record and
//! step, and pool errors are collected rather than lost inside worker
//! threads.

use thiserror::Error;

/// Error type for all mapping engine operations.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// A field specification string did not match the spec grammar.
    ///
    /// Raised at extractor construction time, never during per-record
    /// extraction.
    #[error("Invalid field specification: {0}")]
    InvalidSpecification(String),

    /// A step was registered with a callable of unsupported arity.
    #[error("Invalid step arity: {0}")]
    Arity(String),

    /// A field-mapping step was registered without a usable field name.
    #[error("Invalid step name: {0}")]
    Naming(String),

    /// A user-supplied step failed while mapping a specific record.
    #[error("Mapping failed for {record}, step {step}: {source}")]
    Mapping {
        /// Human-readable identification of the record (position and id).
        record: String,
        /// Source location of the failing step.
        step: String,
        /// The underlying step error.
        #[source]
        source: anyhow::Error,
    },

    /// An after-processing step failed. Always fatal.
    #[error("After-processing step {step} failed: {source}")]
    AfterProcessing {
        /// Source location of the failing step.
        step: String,
        /// The underlying step error.
        #[source]
        source: anyhow::Error,
    },

    /// A worker-pool job failed or a worker panicked.
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// A completed orchestrator was asked to process again.
    #[error("Indexer already completed: {0}")]
    CompletedState(String),

    /// IO error from an underlying source/destination.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`IndexerError`].
pub type Result<T> = std::result::Result<T, IndexerError>;
