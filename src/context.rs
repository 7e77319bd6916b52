//! Per-record execution state.
//!
//! An [`ExecutionContext`] is created fresh for every record by the
//! orchestrator, mutated only by the pipeline executing that record (it is
//! never shared across threads), and finally handed to the writer — unless
//! the record was skipped.
//!
//! The context moves through a small state machine:
//!
//! ```text
//! Fresh -> Mapping -> Mapped
//!              \----> Skipped
//! ```
//!
//! `Mapped` and `Skipped` are terminal; a context never re-enters
//! `Mapping`. [`ExecutionContext::skip`] is idempotent and may be called
//! from any step; once set, no further steps run and the writer never sees
//! the record.

use crate::error::{IndexerError, Result};
use crate::record::Record;
use crate::settings::Settings;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created, pipeline not yet started.
    Fresh,
    /// Pipeline currently executing.
    Mapping,
    /// Pipeline finished; ready for the writer. Terminal.
    Mapped,
    /// Marked skipped by a step or error handler. Terminal.
    Skipped,
}

/// Mutable per-record state threaded through the pipeline.
///
/// The record is held behind an `Arc` so that a step callable can borrow it
/// while also holding the context mutably; the context is still exclusively
/// owned by one worker task for its lifetime.
#[derive(Debug)]
pub struct ExecutionContext {
    record: Arc<Record>,
    output: IndexMap<String, Vec<String>>,
    clipboard: HashMap<String, serde_json::Value>,
    state: ContextState,
    skip_message: Option<String>,
    position: usize,
    position_in_input: usize,
    input_name: Option<String>,
    record_id: Option<String>,
    settings: Arc<Settings>,
    current_step: Option<String>,
}

impl ExecutionContext {
    /// Create a fresh context for one record.
    #[must_use]
    pub fn new(record: Record, settings: Arc<Settings>) -> Self {
        ExecutionContext {
            record: Arc::new(record),
            output: IndexMap::new(),
            clipboard: HashMap::new(),
            state: ContextState::Fresh,
            skip_message: None,
            position: 0,
            position_in_input: 0,
            input_name: None,
            record_id: None,
            settings,
            current_step: None,
        }
    }

    /// Set the 1-based global and per-input positions.
    #[must_use]
    pub fn with_position(mut self, position: usize, position_in_input: usize) -> Self {
        self.position = position;
        self.position_in_input = position_in_input;
        self
    }

    /// Label the input stream this record came from.
    #[must_use]
    pub fn with_input_name(mut self, name: &str) -> Self {
        self.input_name = Some(name.to_string());
        self
    }

    /// Attach a record identifier for diagnostics.
    #[must_use]
    pub fn with_record_id(mut self, id: Option<String>) -> Self {
        self.record_id = id;
        self
    }

    /// The source record being mapped.
    #[must_use]
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Shared handle to the source record, used by the pipeline to borrow
    /// the record across a step call that also mutates the context.
    #[must_use]
    pub fn record_shared(&self) -> Arc<Record> {
        Arc::clone(&self.record)
    }

    /// The output document built so far: field name -> ordered values.
    #[must_use]
    pub fn output(&self) -> &IndexMap<String, Vec<String>> {
        &self.output
    }

    /// Mutable access to the output document.
    pub fn output_mut(&mut self) -> &mut IndexMap<String, Vec<String>> {
        &mut self.output
    }

    /// The output document rendered as a JSON object, for writers that
    /// serialize documents.
    #[must_use]
    pub fn output_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.output).unwrap_or(serde_json::Value::Null)
    }

    /// Stash a scratch value for a later step.
    pub fn clipboard_put(&mut self, key: &str, value: serde_json::Value) {
        self.clipboard.insert(key.to_string(), value);
    }

    /// Read a scratch value left by an earlier step.
    #[must_use]
    pub fn clipboard_get(&self, key: &str) -> Option<&serde_json::Value> {
        self.clipboard.get(key)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Mark this record skipped. Idempotent; the first message wins.
    pub fn skip(&mut self, message: &str) {
        if self.state != ContextState::Skipped {
            self.state = ContextState::Skipped;
            self.skip_message = Some(message.to_string());
        }
    }

    /// Whether the record has been marked skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.state == ContextState::Skipped
    }

    /// The message recorded by the first `skip` call, if any.
    #[must_use]
    pub fn skip_message(&self) -> Option<&str> {
        self.skip_message.as_deref()
    }

    /// Transition Fresh -> Mapping.
    ///
    /// # Errors
    ///
    /// Fails when the context is terminal or already mapping; a context is
    /// mapped at most once.
    pub fn begin_mapping(&mut self) -> Result<()> {
        match self.state {
            ContextState::Fresh => {
                self.state = ContextState::Mapping;
                Ok(())
            }
            other => Err(IndexerError::Mapping {
                record: self.record_inspect(),
                step: "<pipeline>".to_string(),
                source: anyhow::anyhow!("context in state {other:?} cannot re-enter mapping"),
            }),
        }
    }

    /// Transition Mapping -> Mapped. A skipped context stays skipped.
    pub fn finish_mapping(&mut self) {
        if self.state == ContextState::Mapping {
            self.state = ContextState::Mapped;
        }
    }

    /// 1-based position in the overall stream.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// 1-based position within the current input.
    #[must_use]
    pub fn position_in_input(&self) -> usize {
        self.position_in_input
    }

    /// Label of the input stream, when known.
    #[must_use]
    pub fn input_name(&self) -> Option<&str> {
        self.input_name.as_deref()
    }

    /// Record identifier for diagnostics, when known.
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    /// Shared run settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Source location of the step currently executing, for error
    /// attribution.
    #[must_use]
    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    /// Record the step about to execute.
    pub fn set_current_step(&mut self, location: Option<String>) {
        self.current_step = location;
    }

    /// Human-readable identification of this record for log lines and
    /// errors, e.g. `<record #42 (7 in input-b), id:ocm0042>`.
    #[must_use]
    pub fn record_inspect(&self) -> String {
        let mut out = format!("<record #{}", self.position);
        if let Some(name) = &self.input_name {
            out.push_str(&format!(" ({} in {name})", self.position_in_input));
        }
        if let Some(id) = &self.record_id {
            out.push_str(&format!(", id:{id}"));
        }
        out.push('>');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_context() -> ExecutionContext {
        ExecutionContext::new(Record::new(), Arc::new(Settings::new()))
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut ctx = fresh_context();
        assert_eq!(ctx.state(), ContextState::Fresh);
        ctx.begin_mapping().unwrap();
        assert_eq!(ctx.state(), ContextState::Mapping);
        ctx.finish_mapping();
        assert_eq!(ctx.state(), ContextState::Mapped);
    }

    #[test]
    fn test_mapped_context_cannot_remap() {
        let mut ctx = fresh_context();
        ctx.begin_mapping().unwrap();
        ctx.finish_mapping();
        assert!(ctx.begin_mapping().is_err());
    }

    #[test]
    fn test_skip_is_idempotent_and_terminal() {
        let mut ctx = fresh_context();
        ctx.begin_mapping().unwrap();
        ctx.skip("no title");
        ctx.skip("second reason");
        assert!(ctx.is_skipped());
        assert_eq!(ctx.skip_message(), Some("no title"));

        // finish_mapping must not overwrite the skipped state.
        ctx.finish_mapping();
        assert_eq!(ctx.state(), ContextState::Skipped);
        assert!(ctx.begin_mapping().is_err());
    }

    #[test]
    fn test_record_inspect_formats() {
        let ctx = fresh_context()
            .with_position(42, 7)
            .with_input_name("input-b")
            .with_record_id(Some("ocm0042".to_string()));
        assert_eq!(ctx.record_inspect(), "<record #42 (7 in input-b), id:ocm0042>");

        let bare = fresh_context().with_position(3, 3);
        assert_eq!(bare.record_inspect(), "<record #3>");
    }

    #[test]
    fn test_clipboard_round_trip() {
        let mut ctx = fresh_context();
        ctx.clipboard_put("year", serde_json::json!(2002));
        assert_eq!(ctx.clipboard_get("year"), Some(&serde_json::json!(2002)));
        assert_eq!(ctx.clipboard_get("absent"), None);
    }

    #[test]
    fn test_output_json() {
        let mut ctx = fresh_context();
        ctx.output_mut()
            .insert("title".to_string(), vec!["A title".to_string()]);
        assert_eq!(
            ctx.output_json(),
            serde_json::json!({"title": ["A title"]})
        );
    }
}
