//! The document-sink capability.
//!
//! The engine requires only that something *accepts completed documents*:
//! [`DocumentSink`] is the narrow interface concrete writers (search
//! engine clients, serializers) implement. `put` is called from worker
//! threads concurrently, so implementations own their synchronization —
//! batching behind a mutex or a queue is the writer's business.
//!
//! A writer may internally skip documents it fails to deliver;
//! [`DocumentSink::skipped_record_count`] reports those, and a non-zero
//! count is the engine's sanctioned soft-failure signal back to callers.
//!
//! [`ArrayWriter`] is the in-memory implementation used by tests.

use crate::context::ExecutionContext;
use crate::error::Result;
use std::sync::Mutex;

/// Accepts completed output documents.
pub trait DocumentSink: Send + Sync {
    /// Accept one mapped record's context.
    ///
    /// Must tolerate concurrent calls from multiple worker threads.
    ///
    /// # Errors
    ///
    /// An error here is a hard delivery failure and aborts the run; a
    /// writer wanting soft failure instead counts the document as skipped.
    fn put(&self, context: ExecutionContext) -> Result<()>;

    /// Flush and release resources after the last `put`.
    ///
    /// # Errors
    ///
    /// Implementations surface flush failures; the orchestrator treats
    /// them as fatal.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Number of documents this writer dropped instead of delivering.
    fn skipped_record_count(&self) -> usize {
        0
    }
}

/// An in-memory sink collecting every context it is handed.
///
/// Worker threads may complete records out of input order, so the
/// collected contexts are in arrival order; use
/// [`ArrayWriter::into_contexts_sorted`] for position order.
#[derive(Debug, Default)]
pub struct ArrayWriter {
    contexts: Mutex<Vec<ExecutionContext>>,
}

impl ArrayWriter {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        ArrayWriter::default()
    }

    /// Number of documents collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.lock().expect("writer lock poisoned").len()
    }

    /// Whether nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the writer, returning contexts in arrival order.
    #[must_use]
    pub fn into_contexts(self) -> Vec<ExecutionContext> {
        self.contexts
            .into_inner()
            .expect("writer lock poisoned")
    }

    /// Consume the writer, returning contexts sorted by stream position.
    #[must_use]
    pub fn into_contexts_sorted(self) -> Vec<ExecutionContext> {
        let mut contexts = self.into_contexts();
        contexts.sort_by_key(ExecutionContext::position);
        contexts
    }
}

impl DocumentSink for ArrayWriter {
    fn put(&self, context: ExecutionContext) -> Result<()> {
        self.contexts
            .lock()
            .expect("writer lock poisoned")
            .push(context);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::settings::Settings;
    use std::sync::Arc;

    fn context_at(position: usize) -> ExecutionContext {
        ExecutionContext::new(Record::new(), Arc::new(Settings::new()))
            .with_position(position, position)
    }

    #[test]
    fn test_collects_in_arrival_order() {
        let writer = ArrayWriter::new();
        writer.put(context_at(2)).unwrap();
        writer.put(context_at(1)).unwrap();
        assert_eq!(writer.len(), 2);

        let positions: Vec<_> = writer
            .into_contexts()
            .iter()
            .map(ExecutionContext::position)
            .collect();
        assert_eq!(positions, vec![2, 1]);
    }

    #[test]
    fn test_sorted_by_position() {
        let writer = ArrayWriter::new();
        for position in [3, 1, 2] {
            writer.put(context_at(position)).unwrap();
        }
        let positions: Vec<_> = writer
            .into_contexts_sorted()
            .iter()
            .map(ExecutionContext::position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_concurrent_puts() {
        let writer = Arc::new(ArrayWriter::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let writer = Arc::clone(&writer);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        writer.put(context_at(t * 25 + i + 1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(writer.len(), 100);
    }

    #[test]
    fn test_default_skipped_count_is_zero() {
        let writer = ArrayWriter::new();
        assert_eq!(writer.skipped_record_count(), 0);
    }
}
