/*!
 * Submission Queue
 * Bounded lock-free queue of filesystem requests awaiting a worker
 */

use super::completion::CompletionPayload;
use super::LoopError;
use crate::fs::types::{FileHandle, OpenFlags, ReadBuffer};
use bytes::Bytes;
use crossbeam_queue::ArrayQueue;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bounded submission queue
///
/// Assigns each entry its sequence number on push; the sequence number is
/// what the loop uses to route the completion back to its handler.
pub struct SubmissionQueue {
    ring: ArrayQueue<SubmissionEntry>,
    seq_counter: AtomicU64,
}

impl SubmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity.max(1)),
            seq_counter: AtomicU64::new(0),
        }
    }

    /// Reserve the next sequence number
    pub fn next_seq(&self) -> u64 {
        self.seq_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Push an entry; a full queue hands the entry back
    pub fn push(&self, entry: SubmissionEntry) -> Result<(), (LoopError, SubmissionEntry)> {
        self.ring
            .push(entry)
            .map_err(|entry| (LoopError::SubmissionQueueFull, entry))
    }

    pub fn pop(&self) -> Option<SubmissionEntry> {
        self.ring.pop()
    }

    /// Pop up to `max` entries
    pub fn pop_batch(&self, max: usize) -> Vec<SubmissionEntry> {
        let mut batch = Vec::with_capacity(max.min(self.ring.len()));
        for _ in 0..max {
            match self.ring.pop() {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// One in-flight request
///
/// Owns everything the operation needs (paths, buffers) so it can move to a
/// worker and come back inside the completion.
#[derive(Debug)]
pub struct SubmissionEntry {
    pub seq: u64,
    pub op: FsOp,
}

impl SubmissionEntry {
    pub fn new(seq: u64, op: FsOp) -> Self {
        Self { seq, op }
    }
}

/// Filesystem operations the loop can execute
#[derive(Debug)]
pub enum FsOp {
    Stat {
        path: PathBuf,
    },
    Open {
        path: PathBuf,
        flags: OpenFlags,
        mode: u32,
    },
    Read {
        fd: FileHandle,
        buf: ReadBuffer,
    },
    Write {
        fd: FileHandle,
        data: Bytes,
        offset: u64,
    },
    Close {
        fd: FileHandle,
    },
}

impl FsOp {
    /// Operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            FsOp::Stat { .. } => "stat",
            FsOp::Open { .. } => "open",
            FsOp::Read { .. } => "read",
            FsOp::Write { .. } => "write",
            FsOp::Close { .. } => "close",
        }
    }

    /// Hand back owned buffers when the operation never ran
    pub fn into_payload(self) -> CompletionPayload {
        match self {
            FsOp::Read { buf, .. } => CompletionPayload::Read(buf),
            FsOp::Write { data, .. } => CompletionPayload::Write(data),
            FsOp::Stat { .. } | FsOp::Open { .. } | FsOp::Close { .. } => CompletionPayload::None,
        }
    }
}
