//! Bounded worker pool with caller-runs backpressure.
//!
//! [`WorkPool`] executes per-record mapping work, potentially in parallel:
//!
//! - **size 0** — the null pool: every submitted job runs synchronously in
//!   the caller's thread. Same side effects and per-submission ordering as
//!   a threaded pool, differing only in timing.
//! - **size N** — exactly N worker threads draining a bounded
//!   `crossbeam_channel` queue of capacity 3×N. When the queue is full the
//!   submitting thread runs the job itself (**caller-runs**): a slow
//!   consumer throttles the producer without unbounded buffering.
//!
//! A process-wide kill-switch ([`disable_concurrency`]) degrades every
//! pool to null behavior, for deterministic tests and single-core
//! environments.
//!
//! Errors (and panics) inside jobs are captured at the work-item boundary
//! into a shared collection instead of killing the worker; callers surface
//! them with [`WorkPool::raise_collected_error`], which the orchestrator
//! invokes after every submission and again after shutdown — no error is
//! silently swallowed. [`WorkPool::shutdown_and_wait`] drains all queued
//! and in-flight work and reports the elapsed wait, which is the number to
//! look at when a writer is suspected of being the bottleneck.

use crate::error::{IndexerError, Result};
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

static CONCURRENCY_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable concurrency process-wide: every pool, of any size, behaves as a
/// null pool from now on. Intended for deterministic testing and
/// single-core environments.
pub fn disable_concurrency() {
    CONCURRENCY_DISABLED.store(true, Ordering::SeqCst);
}

/// Re-enable concurrency after [`disable_concurrency`]. Pools created
/// while disabled stay null.
pub fn enable_concurrency() {
    CONCURRENCY_DISABLED.store(false, Ordering::SeqCst);
}

/// Whether the process-wide kill-switch is set.
#[must_use]
pub fn concurrency_disabled() -> bool {
    CONCURRENCY_DISABLED.load(Ordering::SeqCst)
}

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

struct PoolInner {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

/// Fixed-size worker pool abstraction over null and threaded execution.
pub struct WorkPool {
    inner: Option<PoolInner>,
    errors: Arc<Mutex<Vec<IndexerError>>>,
}

impl std::fmt::Debug for WorkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkPool")
            .field("threaded", &self.inner.is_some())
            .field(
                "workers",
                &self.inner.as_ref().map_or(0, |i| i.workers.len()),
            )
            .finish_non_exhaustive()
    }
}

impl WorkPool {
    /// Create a pool with the given worker count.
    ///
    /// Size 0 — or any size while the kill-switch is set — yields a null
    /// pool.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let errors = Arc::new(Mutex::new(Vec::new()));
        if size == 0 || concurrency_disabled() {
            return WorkPool {
                inner: None,
                errors,
            };
        }

        let (sender, receiver) = bounded::<Job>(size * 3);
        let workers = (0..size)
            .map(|_| {
                let receiver = receiver.clone();
                let errors = Arc::clone(&errors);
                thread::spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        run_collecting(job, &errors);
                    }
                })
            })
            .collect();

        WorkPool {
            inner: Some(PoolInner {
                sender: Some(sender),
                workers,
            }),
            errors,
        }
    }

    /// Whether this pool executes everything in the caller's thread.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Submit a job.
    ///
    /// Null pool: the job runs here and now. Threaded pool: the job is
    /// queued; if the queue is full the job runs in the calling thread
    /// instead (caller-runs backpressure). Either way a job failure lands
    /// in the collected-error set, never in this call's return.
    pub fn maybe_in_pool<F>(&self, job: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        match &self.inner {
            None => run_collecting(Box::new(job), &self.errors),
            Some(inner) => {
                let Some(sender) = inner.sender.as_ref() else {
                    self.push_error(IndexerError::Pool(
                        "job submitted after pool shutdown".to_string(),
                    ));
                    return;
                };
                match sender.try_send(Box::new(job)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(job)) => run_collecting(job, &self.errors),
                    Err(TrySendError::Disconnected(_)) => {
                        self.push_error(IndexerError::Pool(
                            "job queue disconnected; workers are gone".to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// Surface the oldest collected error, removing it from the set.
    ///
    /// # Errors
    ///
    /// Returns the oldest collected job error or worker panic, if any.
    pub fn raise_collected_error(&self) -> Result<()> {
        let mut errors = self.errors.lock().expect("pool error lock poisoned");
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.remove(0))
        }
    }

    /// Number of collected, not-yet-raised errors.
    #[must_use]
    pub fn collected_error_count(&self) -> usize {
        self.errors.lock().expect("pool error lock poisoned").len()
    }

    /// Drain all queued and in-flight work, stop the workers, and return
    /// the elapsed wait.
    ///
    /// A long elapsed time here means the pool was still deep in queued
    /// work at end of input — the pool is too small or the writer too
    /// slow.
    pub fn shutdown_and_wait(&mut self) -> Duration {
        let start = Instant::now();
        let errors = Arc::clone(&self.errors);
        if let Some(inner) = &mut self.inner {
            // Dropping the sender closes the channel; workers drain the
            // remaining queue and exit.
            inner.sender.take();
            for handle in inner.workers.drain(..) {
                if handle.join().is_err() {
                    errors
                        .lock()
                        .expect("pool error lock poisoned")
                        .push(IndexerError::Pool(
                            "worker thread panicked outside a job".to_string(),
                        ));
                }
            }
        }
        start.elapsed()
    }

    fn push_error(&self, err: IndexerError) {
        self.errors
            .lock()
            .expect("pool error lock poisoned")
            .push(err);
    }
}

impl Drop for WorkPool {
    fn drop(&mut self) {
        self.shutdown_and_wait();
    }
}

/// Run one job, capturing its error or panic into the collected set.
fn run_collecting(job: Job, errors: &Mutex<Vec<IndexerError>>) {
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(job));
    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(panic) => IndexerError::Pool(format!("job panicked: {}", panic_message(&panic))),
    };
    errors.lock().expect("pool error lock poisoned").push(failure);
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
