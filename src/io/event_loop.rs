/*!
 * Event Loop
 *
 * Single-threaded completion dispatch over a blocking worker pool.
 *
 * Requests are queued on a bounded submission queue, flushed to the worker
 * pool when the loop runs, and their completions come back over a channel.
 * Every completion is dispatched on the thread running the loop, one at a
 * time, to the handler registered for its sequence number.
 */

use super::completion::CompletionEntry;
use super::executor::IoExecutor;
use super::submission::{FsOp, SubmissionEntry, SubmissionQueue};
use super::{LoopError, LoopStats, RunMode};
use crate::backend::{IoBackend, LocalBackend};
use crate::core::config::FsConfig;
use crate::core::limits::{SLOW_OPERATION_THRESHOLD, SUBMISSION_BATCH_SIZE};
use nix::errno::Errno;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

/// Completion handler owned by the loop until its single completion fires
pub type CompletionHandler = Box<dyn FnOnce(CompletionEntry)>;

static LOOP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Handle to an event loop
///
/// Cheap to clone; clones share the same loop. The loop is bound to the
/// thread that created it.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

/// Non-owning handle to an [`EventLoop`]
///
/// Held by work parked inside the loop's own handler table, so that pending
/// handlers never keep their loop alive.
#[derive(Clone)]
pub(crate) struct WeakEventLoop {
    inner: Weak<LoopInner>,
}

impl WeakEventLoop {
    pub(crate) fn upgrade(&self) -> Option<EventLoop> {
        self.inner.upgrade().map(|inner| EventLoop { inner })
    }
}

struct LoopInner {
    id: u64,
    submissions: SubmissionQueue,
    handlers: RefCell<HashMap<u64, CompletionHandler>>,
    completion_tx: flume::Sender<CompletionEntry>,
    completion_rx: flume::Receiver<CompletionEntry>,
    executor: Arc<IoExecutor>,
    runtime: RefCell<Option<Runtime>>,
    running: Cell<bool>,
    stats: Counters,
}

#[derive(Default)]
struct Counters {
    submissions: Cell<u64>,
    completions: Cell<u64>,
    rejected: Cell<u64>,
}

impl EventLoop {
    /// Create a loop executing operations on `backend`
    pub fn new(backend: Arc<dyn IoBackend>, config: &FsConfig) -> Result<Self, LoopError> {
        config.validate()?;

        let id = LOOP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.workers)
            .thread_name(format!("loopfs-{}-worker", id))
            .build()
            .map_err(|e| LoopError::Runtime(e.to_string()))?;

        let (completion_tx, completion_rx) = flume::unbounded();

        info!(
            loop_id = id,
            backend = backend.name(),
            workers = config.workers,
            sq_size = config.sq_size,
            "Event loop created"
        );

        Ok(Self {
            inner: Rc::new(LoopInner {
                id,
                submissions: SubmissionQueue::new(config.sq_size),
                handlers: RefCell::new(HashMap::new()),
                completion_tx,
                completion_rx,
                executor: Arc::new(IoExecutor::new(backend)),
                runtime: RefCell::new(Some(runtime)),
                running: Cell::new(false),
                stats: Counters::default(),
            }),
        })
    }

    /// Create a loop over the host filesystem
    pub fn local(config: &FsConfig) -> Result<Self, LoopError> {
        Self::new(Arc::new(LocalBackend::new()), config)
    }

    /// Loop identifier for logging
    pub(crate) fn downgrade(&self) -> WeakEventLoop {
        WeakEventLoop {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The backend operations execute against
    pub fn backend(&self) -> &Arc<dyn IoBackend> {
        self.inner.executor.backend()
    }

    /// True while `run` is executing
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Operations submitted whose completion has not been dispatched yet
    pub fn pending(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    /// Submit an operation
    ///
    /// `handler` is invoked exactly once, from inside `run`, with the
    /// operation's completion. When the submission queue is full the
    /// completion carries `-EAGAIN` and any buffer the operation owned.
    pub fn submit(&self, op: FsOp, handler: CompletionHandler) -> u64 {
        let inner = &self.inner;
        let seq = inner.submissions.next_seq();
        let name = op.name();

        inner.handlers.borrow_mut().insert(seq, handler);
        inner.stats.submissions.set(inner.stats.submissions.get() + 1);

        if let Err((err, entry)) = inner.submissions.push(SubmissionEntry::new(seq, op)) {
            warn!(loop_id = inner.id, seq, op = name, error = %err, "Submission rejected");
            inner.stats.rejected.set(inner.stats.rejected.get() + 1);
            let completion = CompletionEntry::new(
                seq,
                name,
                -i64::from(Errno::EAGAIN as i32),
                entry.op.into_payload(),
            );
            // The loop holds the receiver, so this cannot fail
            let _ = inner.completion_tx.send(completion);
        } else {
            debug!(loop_id = inner.id, seq, op = name, "Submitted");
        }

        seq
    }

    /// Run the loop
    ///
    /// Returns the number of completions dispatched. Re-entrant calls (from
    /// inside a completion handler) are rejected.
    pub fn run(&self, mode: RunMode) -> Result<usize, LoopError> {
        let inner = &self.inner;
        if inner.running.replace(true) {
            return Err(LoopError::AlreadyRunning);
        }
        let _guard = RunningGuard(inner);

        let mut dispatched = 0;
        loop {
            self.flush_submissions()?;

            if self.pending() == 0 {
                break;
            }

            let entry = match mode {
                RunMode::NoWait => match inner.completion_rx.try_recv() {
                    Ok(entry) => entry,
                    Err(flume::TryRecvError::Empty) => break,
                    Err(flume::TryRecvError::Disconnected) => return Err(LoopError::Disconnected),
                },
                RunMode::Default | RunMode::Once => inner
                    .completion_rx
                    .recv()
                    .map_err(|_| LoopError::Disconnected)?,
            };

            self.dispatch(entry);
            dispatched += 1;

            if mode == RunMode::Once {
                // Also deliver whatever else is already complete
                while let Ok(entry) = inner.completion_rx.try_recv() {
                    self.dispatch(entry);
                    dispatched += 1;
                }
                self.flush_submissions()?;
                break;
            }
        }

        Ok(dispatched)
    }

    /// Statistics snapshot
    pub fn stats(&self) -> LoopStats {
        let stats = &self.inner.stats;
        LoopStats {
            submissions: stats.submissions.get(),
            completions: stats.completions.get(),
            rejected: stats.rejected.get(),
            pending: self.pending(),
        }
    }

    fn flush_submissions(&self) -> Result<(), LoopError> {
        let inner = &self.inner;
        if inner.submissions.is_empty() {
            return Ok(());
        }

        let runtime = inner.runtime.borrow();
        let runtime = runtime.as_ref().ok_or(LoopError::WorkersUnavailable)?;

        while !inner.submissions.is_empty() {
            for entry in inner.submissions.pop_batch(SUBMISSION_BATCH_SIZE) {
                let executor = Arc::clone(&inner.executor);
                let tx = inner.completion_tx.clone();
                runtime.spawn_blocking(move || {
                    let completion = executor.execute(entry);
                    // Receiver is gone only once the loop itself is dropped
                    let _ = tx.send(completion);
                });
            }
        }

        Ok(())
    }

    fn dispatch(&self, entry: CompletionEntry) {
        let inner = &self.inner;
        // Release the map before invoking: handlers submit follow-up work
        let handler = inner.handlers.borrow_mut().remove(&entry.seq);

        match handler {
            Some(handler) => {
                inner.stats.completions.set(inner.stats.completions.get() + 1);
                if entry.elapsed > SLOW_OPERATION_THRESHOLD {
                    warn!(
                        loop_id = inner.id,
                        seq = entry.seq,
                        op = entry.op,
                        duration_ms = entry.elapsed.as_millis() as u64,
                        slow = true,
                        "slow filesystem operation"
                    );
                }
                debug!(loop_id = inner.id, seq = entry.seq, op = entry.op, result = entry.result, "Completed");
                handler(entry);
            }
            None => {
                warn!(loop_id = inner.id, seq = entry.seq, op = entry.op, "Completion without handler dropped");
                drop(entry.payload);
            }
        }
    }
}

struct RunningGuard<'a>(&'a LoopInner);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.running.set(false);
    }
}

impl Drop for LoopInner {
    fn drop(&mut self) {
        let pending = self.handlers.get_mut().len();
        if pending > 0 {
            warn!(loop_id = self.id, pending, "Event loop dropped with pending operations");
        }
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
        debug!(loop_id = self.id, "Event loop destroyed");
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("id", &self.inner.id)
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .finish()
    }
}
