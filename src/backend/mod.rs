/*!
 * I/O Backend
 * Raw filesystem calls executed by the event loop's workers
 */

pub mod local;
pub mod memory;

pub use local::LocalBackend;
pub use memory::MemoryBackend;

use crate::fs::types::{FileHandle, OpenFlags, Stats};
use nix::errno::Errno;
use std::path::Path;

/// Backend call result; failures carry the errno the platform reported
pub type BackendResult<T> = Result<T, Errno>;

/// Platform filesystem calls
///
/// Each method performs exactly one blocking call. Implementations are shared
/// by every worker of a loop, so they must be thread-safe.
pub trait IoBackend: Send + Sync {
    /// Stat a path
    fn stat(&self, path: &Path) -> BackendResult<Stats>;

    /// Open a path, returning a new handle
    fn open(&self, path: &Path, flags: OpenFlags, mode: u32) -> BackendResult<FileHandle>;

    /// Read into `buf` at `offset`, returning the bytes read (0 at end of file)
    fn read(&self, fd: FileHandle, buf: &mut [u8], offset: u64) -> BackendResult<usize>;

    /// Write `data` at `offset`, returning the bytes written
    fn write(&self, fd: FileHandle, data: &[u8], offset: u64) -> BackendResult<usize>;

    /// Close a handle
    fn close(&self, fd: FileHandle) -> BackendResult<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
