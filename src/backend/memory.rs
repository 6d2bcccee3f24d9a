/*!
 * In-Memory Backend
 * Volatile file tree for tests and scratch storage
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::time::SystemTime;

use ahash::RandomState;
use dashmap::DashMap;
use nix::errno::Errno;
use parking_lot::RwLock;
use tracing::debug;

use super::{BackendResult, IoBackend};
use crate::fs::types::{FileHandle, OpenFlags, Stats, Timespec};

const FIRST_HANDLE: i32 = 3;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
const BLOCK_SIZE: u64 = 4096;

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Vec<u8>,
        mode: u32,
        ino: u64,
        modified: SystemTime,
        created: SystemTime,
    },
    Directory {
        mode: u32,
        ino: u64,
        created: SystemTime,
    },
}

impl Node {
    fn stats(&self) -> Stats {
        match self {
            Node::File {
                data,
                mode,
                ino,
                modified,
                created,
            } => {
                let size = data.len() as u64;
                Stats {
                    mode: u64::from(S_IFREG | mode),
                    nlink: 1,
                    ino: *ino,
                    size,
                    blksize: BLOCK_SIZE,
                    blocks: size.div_ceil(512),
                    atime: Timespec::from(*modified),
                    mtime: Timespec::from(*modified),
                    ctime: Timespec::from(*modified),
                    birthtime: Timespec::from(*created),
                    ..Stats::default()
                }
            }
            Node::Directory { mode, ino, created } => Stats {
                mode: u64::from(S_IFDIR | mode),
                nlink: 2,
                ino: *ino,
                blksize: BLOCK_SIZE,
                atime: Timespec::from(*created),
                mtime: Timespec::from(*created),
                ctime: Timespec::from(*created),
                birthtime: Timespec::from(*created),
                ..Stats::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
struct OpenFile {
    path: PathBuf,
    flags: OpenFlags,
}

/// In-memory backend
///
/// Paths are taken literally; `/` exists from the start and every other
/// directory must be created before files can live in it.
#[derive(Debug)]
pub struct MemoryBackend {
    nodes: RwLock<HashMap<PathBuf, Node, RandomState>>,
    handles: DashMap<i32, OpenFile, RandomState>,
    next_fd: AtomicI32,
    next_ino: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let backend = Self {
            nodes: RwLock::new(HashMap::with_hasher(RandomState::new())),
            handles: DashMap::with_hasher(RandomState::new()),
            next_fd: AtomicI32::new(FIRST_HANDLE),
            next_ino: AtomicU64::new(1),
        };
        let root = Node::Directory {
            mode: 0o755,
            ino: backend.allocate_ino(),
            created: SystemTime::now(),
        };
        backend.nodes.write().insert(PathBuf::from("/"), root);
        backend
    }

    /// Create or replace a file with `data`
    pub fn insert_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> BackendResult<()> {
        let path = path.as_ref();
        let mut nodes = self.nodes.write();
        Self::check_parent(&nodes, path)?;
        if let Some(Node::Directory { .. }) = nodes.get(path) {
            return Err(Errno::EISDIR);
        }
        let now = SystemTime::now();
        let node = Node::File {
            data: data.into(),
            mode: 0o644,
            ino: self.allocate_ino(),
            modified: now,
            created: now,
        };
        nodes.insert(path.to_path_buf(), node);
        Ok(())
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) -> BackendResult<()> {
        let path = path.as_ref();
        let mut nodes = self.nodes.write();
        Self::check_parent(&nodes, path)?;
        if nodes.contains_key(path) {
            return Err(Errno::EEXIST);
        }
        let node = Node::Directory {
            mode: 0o755,
            ino: self.allocate_ino(),
            created: SystemTime::now(),
        };
        nodes.insert(path.to_path_buf(), node);
        Ok(())
    }

    /// Current contents of a file
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.nodes.read().get(path.as_ref()) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Shrink or extend a file, zero-filling any extension
    pub fn set_len(&self, path: impl AsRef<Path>, len: usize) -> BackendResult<()> {
        match self.nodes.write().get_mut(path.as_ref()) {
            Some(Node::File { data, modified, .. }) => {
                data.resize(len, 0);
                *modified = SystemTime::now();
                Ok(())
            }
            Some(Node::Directory { .. }) => Err(Errno::EISDIR),
            None => Err(Errno::ENOENT),
        }
    }

    /// Number of handles currently open
    pub fn open_count(&self) -> usize {
        self.handles.len()
    }

    fn allocate_ino(&self) -> u64 {
        self.next_ino.fetch_add(1, Ordering::Relaxed)
    }

    fn check_parent(nodes: &HashMap<PathBuf, Node, RandomState>, path: &Path) -> BackendResult<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        match nodes.get(parent) {
            Some(Node::Directory { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(Errno::ENOTDIR),
            None => Err(Errno::ENOENT),
        }
    }

    fn handle(&self, fd: FileHandle) -> BackendResult<OpenFile> {
        self.handles
            .get(&fd.raw())
            .map(|h| h.value().clone())
            .ok_or(Errno::EBADF)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBackend for MemoryBackend {
    fn stat(&self, path: &Path) -> BackendResult<Stats> {
        self.nodes
            .read()
            .get(path)
            .map(Node::stats)
            .ok_or(Errno::ENOENT)
    }

    fn open(&self, path: &Path, flags: OpenFlags, mode: u32) -> BackendResult<FileHandle> {
        flags.validate().map_err(|_| Errno::EINVAL)?;

        {
            let mut nodes = self.nodes.write();
            match nodes.get_mut(path) {
                Some(Node::Directory { .. }) => {
                    if flags.is_writable() {
                        return Err(Errno::EISDIR);
                    }
                }
                Some(Node::File { data, modified, .. }) => {
                    if flags.create_new {
                        return Err(Errno::EEXIST);
                    }
                    if flags.truncate {
                        data.clear();
                        *modified = SystemTime::now();
                    }
                }
                None => {
                    if !flags.will_create() {
                        return Err(Errno::ENOENT);
                    }
                    Self::check_parent(&nodes, path)?;
                    let now = SystemTime::now();
                    let node = Node::File {
                        data: Vec::new(),
                        mode: mode & 0o7777,
                        ino: self.allocate_ino(),
                        modified: now,
                        created: now,
                    };
                    nodes.insert(path.to_path_buf(), node);
                }
            }
        }

        let fd = self.next_fd.fetch_add(1, Ordering::Relaxed);
        if fd < FIRST_HANDLE {
            return Err(Errno::EMFILE);
        }
        self.handles.insert(
            fd,
            OpenFile {
                path: path.to_path_buf(),
                flags,
            },
        );

        debug!(path = %path.display(), fd, "Opened in-memory file");
        Ok(FileHandle::from_raw(fd))
    }

    fn read(&self, fd: FileHandle, buf: &mut [u8], offset: u64) -> BackendResult<usize> {
        let handle = self.handle(fd)?;
        if !handle.flags.read {
            return Err(Errno::EBADF);
        }

        match self.nodes.read().get(&handle.path) {
            Some(Node::File { data, .. }) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
                let n = buf.len().min(data.len() - start);
                buf[..n].copy_from_slice(&data[start..start + n]);
                Ok(n)
            }
            Some(Node::Directory { .. }) => Err(Errno::EISDIR),
            None => Ok(0),
        }
    }

    fn write(&self, fd: FileHandle, buf: &[u8], offset: u64) -> BackendResult<usize> {
        let handle = self.handle(fd)?;
        if !handle.flags.is_writable() {
            return Err(Errno::EBADF);
        }

        match self.nodes.write().get_mut(&handle.path) {
            Some(Node::File { data, modified, .. }) => {
                let start = if handle.flags.append {
                    data.len()
                } else {
                    usize::try_from(offset).map_err(|_| Errno::EFBIG)?
                };
                let end = start.checked_add(buf.len()).ok_or(Errno::EFBIG)?;
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[start..end].copy_from_slice(buf);
                *modified = SystemTime::now();
                Ok(buf.len())
            }
            Some(Node::Directory { .. }) => Err(Errno::EISDIR),
            None => Err(Errno::ENOENT),
        }
    }

    fn close(&self, fd: FileHandle) -> BackendResult<()> {
        self.handles
            .remove(&fd.raw())
            .map(|_| ())
            .ok_or(Errno::EBADF)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
