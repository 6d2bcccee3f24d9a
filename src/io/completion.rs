/*!
 * Completion Entries
 * Result code plus operation payload delivered once per submission
 */

use crate::fs::types::{FileHandle, FsError, ReadBuffer, Stats};
use bytes::Bytes;
use std::time::Duration;

/// Completion of one submitted operation
///
/// `result` follows the syscall convention: negative values are `-errno`,
/// non-negative values are operation specific (bytes transferred, handle).
#[derive(Debug)]
pub struct CompletionEntry {
    /// Sequence number matching the submission
    pub seq: u64,
    /// Operation name
    pub op: &'static str,
    /// Result code
    pub result: i64,
    /// Operation payload
    pub payload: CompletionPayload,
    /// Time spent executing on the worker
    pub elapsed: Duration,
}

impl CompletionEntry {
    pub fn new(seq: u64, op: &'static str, result: i64, payload: CompletionPayload) -> Self {
        Self {
            seq,
            op,
            result,
            payload,
            elapsed: Duration::ZERO,
        }
    }

    /// Attach the execution time
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.result >= 0
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.result < 0
    }

    /// Error signal derived from the result code
    pub fn error(&self) -> FsError {
        FsError::from_result(self.result)
    }
}

/// Operation-specific completion payload
#[derive(Debug, Default)]
pub enum CompletionPayload {
    #[default]
    None,
    Stat(Stats),
    Open(FileHandle),
    /// The caller's buffer, handed back whether or not the read succeeded
    Read(ReadBuffer),
    /// The caller's data, handed back whether or not the write succeeded
    Write(Bytes),
}

impl CompletionPayload {
    pub fn into_stats(self) -> Stats {
        match self {
            CompletionPayload::Stat(stats) => stats,
            _ => Stats::default(),
        }
    }

    pub fn into_read_buffer(self) -> Option<ReadBuffer> {
        match self {
            CompletionPayload::Read(buf) => Some(buf),
            _ => None,
        }
    }
}
