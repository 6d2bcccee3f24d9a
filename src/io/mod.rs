/*!
 * Asynchronous I/O Primitive
 *
 * Submission/completion style execution of filesystem operations:
 * - Requests go onto a bounded submission queue
 * - A blocking worker pool executes them against an `IoBackend`
 * - Completions are dispatched on the loop thread, one per request
 */

mod completion;
mod event_loop;
mod executor;
mod submission;

pub use completion::{CompletionEntry, CompletionPayload};
pub use event_loop::{CompletionHandler, EventLoop};
pub(crate) use event_loop::WeakEventLoop;
pub use executor::IoExecutor;
pub use submission::{FsOp, SubmissionEntry, SubmissionQueue};

use crate::core::config::ConfigError;
use thiserror::Error;

/// How long `EventLoop::run` keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Until no operation is pending
    #[default]
    Default,
    /// Block for one completion, then deliver whatever else is ready
    Once,
    /// Deliver only completions that are already ready
    NoWait,
}

/// Event loop error types
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Submission queue full")]
    SubmissionQueueFull,

    #[error("Event loop is already running")]
    AlreadyRunning,

    #[error("Completion channel disconnected")]
    Disconnected,

    #[error("Worker pool unavailable")]
    WorkersUnavailable,

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Loop statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub submissions: u64,
    pub completions: u64,
    /// Submissions completed with EAGAIN because the queue was full
    pub rejected: u64,
    pub pending: usize,
}
