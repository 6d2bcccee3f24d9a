/*!
 * Local Filesystem Backend
 * Wraps std::fs for host filesystem access
 */

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

use ahash::RandomState;
use dashmap::DashMap;
use nix::errno::Errno;
use tracing::{debug, trace};

use super::{BackendResult, IoBackend};
use crate::fs::types::{errno_of, FileHandle, OpenFlags, Stats};

/// First handle handed out (0, 1, 2 are stdin, stdout, stderr)
const FIRST_HANDLE: i32 = 3;

/// Host filesystem backend with an owned handle table
///
/// Handles are allocated from a counter and never recycled, so a stale
/// handle cannot alias a newer file.
pub struct LocalBackend {
    next_fd: AtomicI32,
    open_files: DashMap<i32, File, RandomState>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self {
            next_fd: AtomicI32::new(FIRST_HANDLE),
            open_files: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Number of handles currently open
    pub fn open_count(&self) -> usize {
        self.open_files.len()
    }

    fn allocate_fd(&self) -> BackendResult<FileHandle> {
        let fd = self.next_fd.fetch_add(1, Ordering::Relaxed);
        if fd < FIRST_HANDLE {
            return Err(Errno::EMFILE);
        }
        Ok(FileHandle::from_raw(fd))
    }

    fn open_options(flags: OpenFlags, mode: u32) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(flags.read)
            .write(flags.write)
            .append(flags.append)
            .truncate(flags.truncate)
            .create(flags.create)
            .create_new(flags.create_new);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        options
    }

    fn with_file<T>(
        &self,
        fd: FileHandle,
        mut f: impl FnMut(&File) -> std::io::Result<T>,
    ) -> BackendResult<T> {
        let file = self.open_files.get(&fd.raw()).ok_or(Errno::EBADF)?;
        retry_interrupted(|| f(file.value())).map_err(|e| errno_of(&e))
    }
}

/// Re-issue `op` until it is not interrupted by a signal
fn retry_interrupted<T>(mut op: impl FnMut() -> std::io::Result<T>) -> std::io::Result<T> {
    loop {
        match op() {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBackend for LocalBackend {
    fn stat(&self, path: &Path) -> BackendResult<Stats> {
        let md = fs::metadata(path).map_err(|e| errno_of(&e))?;
        Ok(Stats::from_metadata(&md))
    }

    fn open(&self, path: &Path, flags: OpenFlags, mode: u32) -> BackendResult<FileHandle> {
        // std reports these combinations without an errno
        if (flags.will_create() || flags.truncate) && !flags.is_writable() {
            return Err(Errno::EINVAL);
        }

        let file = Self::open_options(flags, mode)
            .open(path)
            .map_err(|e| errno_of(&e))?;

        let fd = self.allocate_fd()?;
        self.open_files.insert(fd.raw(), file);
        debug!(path = ?path, fd = fd.raw(), flags = ?flags, mode, "opened");
        Ok(fd)
    }

    fn read(&self, fd: FileHandle, buf: &mut [u8], offset: u64) -> BackendResult<usize> {
        let n = self.with_file(fd, |file| read_at(file, buf, offset))?;
        trace!(fd = fd.raw(), offset, requested = buf.len(), read = n, "read");
        Ok(n)
    }

    fn write(&self, fd: FileHandle, data: &[u8], offset: u64) -> BackendResult<usize> {
        let n = self.with_file(fd, |file| write_at(file, data, offset))?;
        trace!(fd = fd.raw(), offset, requested = data.len(), written = n, "write");
        Ok(n)
    }

    fn close(&self, fd: FileHandle) -> BackendResult<()> {
        let (_, file) = self.open_files.remove(&fd.raw()).ok_or(Errno::EBADF)?;
        drop(file);
        debug!(fd = fd.raw(), "closed");
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, data: &[u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(data, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, data: &[u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(data, offset)
}
