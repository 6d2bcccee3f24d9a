/*!
 * Operation Wrappers
 * One request per call, one callback per request
 */

use super::types::{FileHandle, FsError, OpenFlags, ReadBuffer, Stats};
use super::Filesystem;
use crate::io::{CompletionPayload, FsOp};
use bytes::Bytes;
use std::path::{Path, PathBuf};

impl Filesystem {
    /// Stat a path
    ///
    /// Failure delivers zeroed stats.
    pub fn stat<P, F>(&self, path: P, cb: F)
    where
        P: AsRef<Path>,
        F: FnOnce(FsError, Stats) + 'static,
    {
        self.submit_stat(path.as_ref().to_path_buf(), cb);
        self.drive();
    }

    /// Open a path
    ///
    /// Failure delivers [`FileHandle::INVALID`].
    pub fn open<P, F>(&self, path: P, flags: OpenFlags, mode: u32, cb: F)
    where
        P: AsRef<Path>,
        F: FnOnce(FsError, FileHandle) + 'static,
    {
        self.submit_open(path.as_ref().to_path_buf(), flags, mode, cb);
        self.drive();
    }

    /// Read up to `length` bytes at `offset`
    ///
    /// The buffer is delivered on success and failure alike; only its first
    /// `len()` bytes are data, and a zero-length fill of a non-empty request
    /// is end of file.
    pub fn read<F>(&self, fd: FileHandle, length: usize, offset: u64, cb: F)
    where
        F: FnOnce(FsError, ReadBuffer) + 'static,
    {
        self.submit_read(fd, length, offset, cb);
        self.drive();
    }

    /// Write `data` at `offset`, reporting the bytes written
    pub fn write<D, F>(&self, fd: FileHandle, data: D, offset: u64, cb: F)
    where
        D: Into<Bytes>,
        F: FnOnce(FsError, usize) + 'static,
    {
        self.submit_write(fd, data.into(), offset, cb);
        self.drive();
    }

    /// Close a handle; it must not be used again afterwards
    pub fn close<F>(&self, fd: FileHandle, cb: F)
    where
        F: FnOnce(FsError) + 'static,
    {
        self.submit_close(fd, cb);
        self.drive();
    }

    pub(crate) fn submit_stat<F>(&self, path: PathBuf, cb: F)
    where
        F: FnOnce(FsError, Stats) + 'static,
    {
        self.event_loop.submit(
            FsOp::Stat { path },
            Box::new(move |entry| {
                let err = entry.error();
                if err.is_error() {
                    cb(err, Stats::default());
                } else {
                    cb(err, entry.payload.into_stats());
                }
            }),
        );
    }

    pub(crate) fn submit_open<F>(&self, path: PathBuf, flags: OpenFlags, mode: u32, cb: F)
    where
        F: FnOnce(FsError, FileHandle) + 'static,
    {
        self.event_loop.submit(
            FsOp::Open { path, flags, mode },
            Box::new(move |entry| {
                let err = entry.error();
                match entry.payload {
                    CompletionPayload::Open(fd) if !err.is_error() => cb(err, fd),
                    _ => cb(err, FileHandle::INVALID),
                }
            }),
        );
    }

    pub(crate) fn submit_read<F>(&self, fd: FileHandle, length: usize, offset: u64, cb: F)
    where
        F: FnOnce(FsError, ReadBuffer) + 'static,
    {
        let buf = ReadBuffer::new(length, offset);
        self.event_loop.submit(
            FsOp::Read { fd, buf },
            Box::new(move |entry| {
                let err = entry.error();
                let buf = entry
                    .payload
                    .into_read_buffer()
                    .unwrap_or_else(|| ReadBuffer::new(0, offset));
                cb(err, buf);
            }),
        );
    }

    pub(crate) fn submit_write<F>(&self, fd: FileHandle, data: Bytes, offset: u64, cb: F)
    where
        F: FnOnce(FsError, usize) + 'static,
    {
        self.event_loop.submit(
            FsOp::Write { fd, data, offset },
            Box::new(move |entry| {
                let err = entry.error();
                let written = if err.is_error() { 0 } else { entry.result as usize };
                cb(err, written);
            }),
        );
    }

    pub(crate) fn submit_close<F>(&self, fd: FileHandle, cb: F)
    where
        F: FnOnce(FsError) + 'static,
    {
        self.event_loop.submit(
            FsOp::Close { fd },
            Box::new(move |entry| cb(entry.error())),
        );
    }
}
