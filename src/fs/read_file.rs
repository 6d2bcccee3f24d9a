/*!
 * Whole-File Read Pipeline
 *
 * stat -> open -> chunked reads -> close, one request in flight at a time.
 * The machine is boxed and moves into each completion handler; `advance`
 * is the single place state changes.
 */

use super::types::{FileHandle, FsError, ReadBuffer, ReadOptions, Stats};
use super::{Filesystem, WeakFilesystem};
use crate::core::limits::MAX_CHUNK_SIZE;
use crate::monitoring::PipelineSpan;
use bytes::{Bytes, BytesMut};
use nix::errno::Errno;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

type ReadFileCallback = Box<dyn FnOnce(FsError, Bytes)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    AwaitingStat,
    AwaitingOpen { size: u64 },
    AwaitingRead { fd: FileHandle, offset: u64, size: u64 },
    AwaitingClose,
    Done,
}

enum ReadEvent {
    Stat(FsError, Stats),
    Open(FsError, FileHandle),
    Read(FsError, ReadBuffer),
    Close(FsError),
}

struct ReadFile {
    fs: WeakFilesystem,
    path: PathBuf,
    options: ReadOptions,
    chunk_size: usize,
    state: ReadState,
    contents: BytesMut,
    error: FsError,
    reads: u64,
    span: PipelineSpan,
    callback: Option<ReadFileCallback>,
}

impl ReadFile {
    fn start(fs: &Filesystem, path: PathBuf, options: ReadOptions, callback: ReadFileCallback) {
        let machine = Box::new(Self {
            fs: fs.downgrade(),
            span: PipelineSpan::new("read_file", &path),
            chunk_size: fs.config().chunk_size,
            path,
            options,
            state: ReadState::AwaitingStat,
            contents: BytesMut::new(),
            error: FsError::none(),
            reads: 0,
            callback: Some(callback),
        });
        machine.submit_stat();
    }

    fn advance(mut self: Box<Self>, event: ReadEvent) {
        let state = std::mem::replace(&mut self.state, ReadState::Done);

        match (state, event) {
            (ReadState::AwaitingStat, ReadEvent::Stat(err, stats)) => {
                if err.is_error() {
                    return self.finish(err);
                }
                self.state = ReadState::AwaitingOpen { size: stats.size };
                self.contents.reserve(stats.size.min(MAX_CHUNK_SIZE as u64) as usize);
                self.submit_open();
            }
            (ReadState::AwaitingOpen { size }, ReadEvent::Open(err, fd)) => {
                if err.is_error() {
                    return self.finish(err);
                }
                self.state = ReadState::AwaitingRead { fd, offset: 0, size };
                self.next_read();
            }
            (ReadState::AwaitingRead { fd, offset, size }, ReadEvent::Read(err, buf)) => {
                if err.is_error() {
                    self.error = err;
                    self.contents.clear();
                    return self.submit_close(fd);
                }
                if buf.is_eof() {
                    warn!(
                        trace_id = %self.span.trace_id(),
                        path = %self.path.display(),
                        expected = size,
                        got = offset,
                        "File shrank after stat, delivering short contents"
                    );
                    return self.submit_close(fd);
                }
                self.contents.extend_from_slice(buf.as_slice());
                self.state = ReadState::AwaitingRead {
                    fd,
                    offset: offset + buf.len() as u64,
                    size,
                };
                self.next_read();
            }
            (ReadState::AwaitingClose, ReadEvent::Close(err)) => {
                if err.is_error() {
                    warn!(
                        trace_id = %self.span.trace_id(),
                        path = %self.path.display(),
                        error = %err,
                        "Close failed after read"
                    );
                }
                let err = std::mem::take(&mut self.error).or(err);
                self.finish(err);
            }
            (state, _) => {
                error!(
                    trace_id = %self.span.trace_id(),
                    ?state,
                    "Unexpected completion for read pipeline state"
                );
                self.finish(FsError::from_errno(Errno::EIO));
            }
        }
    }

    /// Issue the next chunk, or close once the snapshot size is reached
    fn next_read(mut self: Box<Self>) {
        let ReadState::AwaitingRead { fd, offset, size } = self.state else {
            return self.finish(FsError::from_errno(Errno::EIO));
        };
        if offset >= size {
            return self.submit_close(fd);
        }

        let length = (size - offset).min(self.chunk_size as u64) as usize;
        self.reads += 1;
        debug!(trace_id = %self.span.trace_id(), %fd, offset, length, "read_file chunk");

        let Some(fs) = self.fs.upgrade() else {
            return self.abandon();
        };
        fs.submit_read(fd, length, offset, move |err, buf| {
            self.advance(ReadEvent::Read(err, buf))
        });
    }

    fn submit_stat(self: Box<Self>) {
        let Some(fs) = self.fs.upgrade() else {
            return self.abandon();
        };
        let path = self.path.clone();
        fs.submit_stat(path, move |err, stats| self.advance(ReadEvent::Stat(err, stats)));
    }

    fn submit_open(self: Box<Self>) {
        let Some(fs) = self.fs.upgrade() else {
            return self.abandon();
        };
        let path = self.path.clone();
        let ReadOptions { flags, mode } = self.options;
        fs.submit_open(path, flags, mode, move |err, fd| {
            self.advance(ReadEvent::Open(err, fd))
        });
    }

    fn submit_close(mut self: Box<Self>, fd: FileHandle) {
        self.state = ReadState::AwaitingClose;
        let Some(fs) = self.fs.upgrade() else {
            return self.abandon();
        };
        fs.submit_close(fd, move |err| self.advance(ReadEvent::Close(err)));
    }

    /// The loop is gone; report cancellation instead of issuing the step
    fn abandon(self: Box<Self>) {
        self.finish(FsError::from_errno(Errno::ECANCELED))
    }

    fn finish(mut self: Box<Self>, err: FsError) {
        self.state = ReadState::Done;
        self.span.record_progress(self.contents.len() as u64, self.reads);
        if err.is_error() {
            self.span.record_error(&err.message);
        } else {
            self.span.record_result(true);
        }

        let contents = std::mem::take(&mut self.contents).freeze();
        if let Some(callback) = self.callback.take() {
            callback(err, contents);
        }
    }
}

impl Filesystem {
    /// Read a whole file
    ///
    /// Uses [`ReadOptions::default`]: the file is created if missing.
    pub fn read_file<P, F>(&self, path: P, cb: F)
    where
        P: AsRef<Path>,
        F: FnOnce(FsError, Bytes) + 'static,
    {
        self.read_file_with(path, ReadOptions::default(), cb);
    }

    /// Read a whole file, opening it with `options`
    ///
    /// `cb` fires exactly once. On stat, open or read failure the contents
    /// are empty. A failing close after a complete read still delivers the
    /// contents alongside the error. Reads stop at the size observed by the
    /// initial stat.
    pub fn read_file_with<P, F>(&self, path: P, options: ReadOptions, cb: F)
    where
        P: AsRef<Path>,
        F: FnOnce(FsError, Bytes) + 'static,
    {
        ReadFile::start(self, path.as_ref().to_path_buf(), options, Box::new(cb));
        self.drive();
    }
}
