/*!
 * Blocking Operations
 *
 * The same operations and pipelines as the async surface, executed on the
 * calling thread straight against the backend.
 */

use super::types::{FileHandle, FsError, OpenFlags, ReadOptions, Stats, WriteOptions};
use super::Filesystem;
use crate::core::limits::MAX_CHUNK_SIZE;
use bytes::{Bytes, BytesMut};
use nix::errno::Errno;
use std::path::Path;
use tracing::{debug, warn};

impl Filesystem {
    pub fn stat_sync<P: AsRef<Path>>(&self, path: P) -> Result<Stats, FsError> {
        Ok(self.backend().stat(path.as_ref())?)
    }

    pub fn open_sync<P: AsRef<Path>>(
        &self,
        path: P,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<FileHandle, FsError> {
        Ok(self.backend().open(path.as_ref(), flags, mode)?)
    }

    /// Read into `buf` at `offset`; `Ok(0)` is end of file
    pub fn read_sync(&self, fd: FileHandle, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        Ok(self.backend().read(fd, buf, offset)?)
    }

    pub fn write_sync(&self, fd: FileHandle, data: &[u8], offset: u64) -> Result<usize, FsError> {
        Ok(self.backend().write(fd, data, offset)?)
    }

    pub fn close_sync(&self, fd: FileHandle) -> Result<(), FsError> {
        Ok(self.backend().close(fd)?)
    }

    /// Read a whole file with default options
    pub fn read_file_sync<P: AsRef<Path>>(&self, path: P) -> Result<Bytes, FsError> {
        self.read_file_sync_with(path, ReadOptions::default())
    }

    /// Read a whole file
    ///
    /// Chunks and stops exactly like [`Filesystem::read_file_with`]. A failing
    /// close is reported as the error, since a `Result` cannot carry both.
    pub fn read_file_sync_with<P: AsRef<Path>>(
        &self,
        path: P,
        options: ReadOptions,
    ) -> Result<Bytes, FsError> {
        let path = path.as_ref();
        let size = self.stat_sync(path)?.size;
        let fd = self.open_sync(path, options.flags, options.mode)?;

        let read = self.read_chunks(fd, size);
        let closed = self.close_sync(fd);
        if let Err(ref err) = closed {
            warn!(path = %path.display(), error = %err, "Close failed after read");
        }

        let contents = read?;
        closed?;
        debug!(path = %path.display(), bytes = contents.len(), "read_file_sync complete");
        Ok(contents)
    }

    /// Replace a file's contents with default options
    pub fn write_file_sync<P: AsRef<Path>>(&self, path: P, data: &[u8]) -> Result<(), FsError> {
        self.write_file_sync_with(path, data, WriteOptions::default())
    }

    /// Write a whole buffer, resuming short writes
    pub fn write_file_sync_with<P: AsRef<Path>>(
        &self,
        path: P,
        data: &[u8],
        options: WriteOptions,
    ) -> Result<(), FsError> {
        let path = path.as_ref();
        let fd = self.open_sync(path, options.flags, options.mode)?;

        let written = self.write_chunks(fd, data);
        let closed = self.close_sync(fd);
        if let Err(ref err) = closed {
            warn!(path = %path.display(), error = %err, "Close failed after write");
        }

        written?;
        closed?;
        debug!(path = %path.display(), bytes = data.len(), "write_file_sync complete");
        Ok(())
    }

    fn read_chunks(&self, fd: FileHandle, size: u64) -> Result<Bytes, FsError> {
        let chunk_size = self.config().chunk_size;
        let mut contents = BytesMut::with_capacity(size.min(MAX_CHUNK_SIZE as u64) as usize);
        let mut chunk = vec![0u8; chunk_size];
        let mut offset = 0u64;

        while offset < size {
            let length = (size - offset).min(chunk_size as u64) as usize;
            let n = self.read_sync(fd, &mut chunk[..length], offset)?;
            if n == 0 {
                warn!(%fd, expected = size, got = offset, "File shrank after stat, delivering short contents");
                break;
            }
            contents.extend_from_slice(&chunk[..n]);
            offset += n as u64;
        }

        Ok(contents.freeze())
    }

    fn write_chunks(&self, fd: FileHandle, data: &[u8]) -> Result<(), FsError> {
        let chunk_size = self.config().chunk_size;
        let mut offset = 0usize;

        while offset < data.len() {
            let end = data.len().min(offset + chunk_size);
            let n = self.write_sync(fd, &data[offset..end], offset as u64)?;
            if n == 0 {
                return Err(FsError::from_errno(Errno::EIO));
            }
            offset += n;
        }

        Ok(())
    }
}
