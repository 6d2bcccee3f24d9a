/*!
 * Whole-File Write Pipeline
 * open -> chunked writes -> close
 */

use super::types::{FileHandle, FsError, WriteOptions};
use super::{Filesystem, WeakFilesystem};
use crate::monitoring::PipelineSpan;
use bytes::Bytes;
use nix::errno::Errno;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

type WriteFileCallback = Box<dyn FnOnce(FsError)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    AwaitingOpen,
    AwaitingWrite { fd: FileHandle, offset: usize },
    AwaitingClose,
    Done,
}

enum WriteEvent {
    Open(FsError, FileHandle),
    Write(FsError, usize),
    Close(FsError),
}

struct WriteFile {
    fs: WeakFilesystem,
    path: PathBuf,
    options: WriteOptions,
    chunk_size: usize,
    data: Bytes,
    state: WriteState,
    error: FsError,
    writes: u64,
    span: PipelineSpan,
    callback: Option<WriteFileCallback>,
}

impl WriteFile {
    fn start(
        fs: &Filesystem,
        path: PathBuf,
        data: Bytes,
        options: WriteOptions,
        callback: WriteFileCallback,
    ) {
        let machine = Box::new(Self {
            fs: fs.downgrade(),
            span: PipelineSpan::new("write_file", &path),
            chunk_size: fs.config().chunk_size,
            path,
            options,
            data,
            state: WriteState::AwaitingOpen,
            error: FsError::none(),
            writes: 0,
            callback: Some(callback),
        });
        machine.submit_open();
    }

    fn advance(mut self: Box<Self>, event: WriteEvent) {
        let state = std::mem::replace(&mut self.state, WriteState::Done);

        match (state, event) {
            (WriteState::AwaitingOpen, WriteEvent::Open(err, fd)) => {
                if err.is_error() {
                    return self.finish(err);
                }
                self.state = WriteState::AwaitingWrite { fd, offset: 0 };
                self.next_write();
            }
            (WriteState::AwaitingWrite { fd, offset }, WriteEvent::Write(err, written)) => {
                if err.is_error() {
                    self.error = err;
                    return self.submit_close(fd);
                }
                if written == 0 {
                    warn!(
                        trace_id = %self.span.trace_id(),
                        path = %self.path.display(),
                        offset,
                        remaining = self.data.len() - offset,
                        "Write made no progress"
                    );
                    self.error = FsError::from_errno(Errno::EIO);
                    return self.submit_close(fd);
                }
                self.state = WriteState::AwaitingWrite {
                    fd,
                    offset: offset + written,
                };
                self.next_write();
            }
            (WriteState::AwaitingClose, WriteEvent::Close(err)) => {
                if err.is_error() {
                    warn!(
                        trace_id = %self.span.trace_id(),
                        path = %self.path.display(),
                        error = %err,
                        "Close failed after write"
                    );
                }
                let err = std::mem::take(&mut self.error).or(err);
                self.finish(err);
            }
            (state, _) => {
                error!(
                    trace_id = %self.span.trace_id(),
                    ?state,
                    "Unexpected completion for write pipeline state"
                );
                self.finish(FsError::from_errno(Errno::EIO));
            }
        }
    }

    fn next_write(mut self: Box<Self>) {
        let WriteState::AwaitingWrite { fd, offset } = self.state else {
            return self.finish(FsError::from_errno(Errno::EIO));
        };
        if offset >= self.data.len() {
            return self.submit_close(fd);
        }

        let end = self.data.len().min(offset + self.chunk_size);
        let chunk = self.data.slice(offset..end);
        self.writes += 1;
        debug!(trace_id = %self.span.trace_id(), %fd, offset, length = chunk.len(), "write_file chunk");

        let Some(fs) = self.fs.upgrade() else {
            return self.abandon();
        };
        fs.submit_write(fd, chunk, offset as u64, move |err, written| {
            self.advance(WriteEvent::Write(err, written))
        });
    }

    fn submit_open(self: Box<Self>) {
        let Some(fs) = self.fs.upgrade() else {
            return self.abandon();
        };
        let path = self.path.clone();
        let WriteOptions { flags, mode } = self.options;
        fs.submit_open(path, flags, mode, move |err, fd| {
            self.advance(WriteEvent::Open(err, fd))
        });
    }

    fn submit_close(mut self: Box<Self>, fd: FileHandle) {
        self.state = WriteState::AwaitingClose;
        let Some(fs) = self.fs.upgrade() else {
            return self.abandon();
        };
        fs.submit_close(fd, move |err| self.advance(WriteEvent::Close(err)));
    }

    /// The loop is gone; report cancellation instead of issuing the step
    fn abandon(self: Box<Self>) {
        self.finish(FsError::from_errno(Errno::ECANCELED))
    }

    fn finish(mut self: Box<Self>, err: FsError) {
        self.state = WriteState::Done;
        self.span.record_progress(self.data.len() as u64, self.writes);
        if err.is_error() {
            self.span.record_error(&err.message);
        } else {
            self.span.record_result(true);
        }

        if let Some(callback) = self.callback.take() {
            callback(err);
        }
    }
}

impl Filesystem {
    /// Replace a file's contents, creating it if needed
    pub fn write_file<P, D, F>(&self, path: P, data: D, cb: F)
    where
        P: AsRef<Path>,
        D: Into<Bytes>,
        F: FnOnce(FsError) + 'static,
    {
        self.write_file_with(path, data, WriteOptions::default(), cb);
    }

    /// Write a whole buffer to a file opened with `options`
    ///
    /// Short writes are resumed from where they stopped. On failure the
    /// handle is still closed before `cb` fires, and the first error wins.
    pub fn write_file_with<P, D, F>(&self, path: P, data: D, options: WriteOptions, cb: F)
    where
        P: AsRef<Path>,
        D: Into<Bytes>,
        F: FnOnce(FsError) + 'static,
    {
        WriteFile::start(self, path.as_ref().to_path_buf(), data.into(), options, Box::new(cb));
        self.drive();
    }
}
