/*!
 * I/O Executor
 * Runs one submitted operation against the backend on a worker thread
 */

use super::completion::{CompletionEntry, CompletionPayload};
use super::submission::{FsOp, SubmissionEntry};
use crate::backend::IoBackend;
use nix::errno::Errno;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Executor for submitted filesystem operations
pub struct IoExecutor {
    backend: Arc<dyn IoBackend>,
}

impl IoExecutor {
    pub fn new(backend: Arc<dyn IoBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn IoBackend> {
        &self.backend
    }

    /// Execute a single operation, producing its completion
    pub fn execute(&self, entry: SubmissionEntry) -> CompletionEntry {
        let start = Instant::now();
        let name = entry.op.name();
        let (result, payload) = self.execute_operation(entry.op);

        trace!(seq = entry.seq, op = name, result, "operation executed");
        CompletionEntry::new(entry.seq, name, result, payload).with_elapsed(start.elapsed())
    }

    fn execute_operation(&self, op: FsOp) -> (i64, CompletionPayload) {
        match op {
            FsOp::Stat { path } => match self.backend.stat(&path) {
                Ok(stats) => (0, CompletionPayload::Stat(stats)),
                Err(errno) => (neg(errno), CompletionPayload::None),
            },
            FsOp::Open { path, flags, mode } => match self.backend.open(&path, flags, mode) {
                Ok(fd) => (i64::from(fd.raw()), CompletionPayload::Open(fd)),
                Err(errno) => (neg(errno), CompletionPayload::None),
            },
            FsOp::Read { fd, mut buf } => {
                let offset = buf.offset();
                let result = match self.backend.read(fd, buf.as_mut_slice(), offset) {
                    Ok(n) => {
                        buf.set_filled(n);
                        n as i64
                    }
                    Err(errno) => neg(errno),
                };
                (result, CompletionPayload::Read(buf))
            }
            FsOp::Write { fd, data, offset } => {
                let result = match self.backend.write(fd, &data, offset) {
                    Ok(n) => n as i64,
                    Err(errno) => neg(errno),
                };
                (result, CompletionPayload::Write(data))
            }
            FsOp::Close { fd } => match self.backend.close(fd) {
                Ok(()) => (0, CompletionPayload::None),
                Err(errno) => (neg(errno), CompletionPayload::None),
            },
        }
    }
}

#[inline]
fn neg(errno: Errno) -> i64 {
    -i64::from(errno as i32)
}
