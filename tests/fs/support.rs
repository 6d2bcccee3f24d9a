/*!
 * Test Support
 * Recording backend with fault injection over the in-memory backend
 */

#![allow(dead_code)]

use loopfs::backend::{BackendResult, IoBackend, MemoryBackend};
use loopfs::{FileHandle, Filesystem, FsConfig, FsError, OpenFlags, Stats};
use nix::errno::Errno;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// One backend call, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Stat(PathBuf),
    Open(PathBuf),
    Read { fd: FileHandle, offset: u64, len: usize },
    Write { fd: FileHandle, offset: u64, len: usize },
    Close(FileHandle),
}

type StatHook = Box<dyn Fn(&MemoryBackend) + Send + Sync>;

#[derive(Default)]
pub struct Faults {
    pub stat: Option<Errno>,
    pub open: Option<Errno>,
    /// Fail the read issued at this offset
    pub read_at: Option<(u64, Errno)>,
    pub write: Option<Errno>,
    pub close: Option<Errno>,
    /// Cap every write at this many bytes
    pub max_write: Option<usize>,
}

pub struct RecordingBackend {
    pub inner: MemoryBackend,
    calls: Mutex<Vec<Call>>,
    faults: Mutex<Faults>,
    after_stat: Mutex<Option<StatHook>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBackend::new(),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
            after_stat: Mutex::new(None),
        })
    }

    pub fn with_file(path: &str, data: &[u8]) -> Arc<Self> {
        let backend = Self::new();
        backend.inner.insert_file(path, data.to_vec()).unwrap();
        backend
    }

    pub fn faults(&self) -> parking_lot::MutexGuard<'_, Faults> {
        self.faults.lock()
    }

    /// Run `hook` once a stat succeeds, before the caller sees the result
    pub fn after_stat(&self, hook: impl Fn(&MemoryBackend) + Send + Sync + 'static) {
        *self.after_stat.lock() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn read_offsets(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Read { offset, .. } => Some(offset),
                _ => None,
            })
            .collect()
    }

    pub fn read_lengths(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Read { len, .. } => Some(len),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl IoBackend for RecordingBackend {
    fn stat(&self, path: &Path) -> BackendResult<Stats> {
        self.record(Call::Stat(path.to_path_buf()));
        if let Some(errno) = self.faults.lock().stat {
            return Err(errno);
        }
        let stats = self.inner.stat(path)?;
        if let Some(hook) = self.after_stat.lock().as_ref() {
            hook(&self.inner);
        }
        Ok(stats)
    }

    fn open(&self, path: &Path, flags: OpenFlags, mode: u32) -> BackendResult<FileHandle> {
        self.record(Call::Open(path.to_path_buf()));
        if let Some(errno) = self.faults.lock().open {
            return Err(errno);
        }
        self.inner.open(path, flags, mode)
    }

    fn read(&self, fd: FileHandle, buf: &mut [u8], offset: u64) -> BackendResult<usize> {
        self.record(Call::Read {
            fd,
            offset,
            len: buf.len(),
        });
        if let Some((at, errno)) = self.faults.lock().read_at {
            if at == offset {
                return Err(errno);
            }
        }
        self.inner.read(fd, buf, offset)
    }

    fn write(&self, fd: FileHandle, data: &[u8], offset: u64) -> BackendResult<usize> {
        self.record(Call::Write {
            fd,
            offset,
            len: data.len(),
        });
        let faults = self.faults.lock();
        if let Some(errno) = faults.write {
            return Err(errno);
        }
        let len = faults.max_write.map_or(data.len(), |max| max.min(data.len()));
        drop(faults);
        self.inner.write(fd, &data[..len], offset)
    }

    fn close(&self, fd: FileHandle) -> BackendResult<()> {
        self.record(Call::Close(fd));
        let injected = self.faults.lock().close;
        // The handle is released even when close reports failure
        let result = self.inner.close(fd);
        match injected {
            Some(errno) => Err(errno),
            None => result,
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn filesystem(backend: &Arc<RecordingBackend>, chunk_size: usize) -> Filesystem {
    let config = FsConfig::new().with_chunk_size(chunk_size).with_workers(2);
    Filesystem::with_backend(backend.clone(), config).unwrap()
}

/// Every invocation of a callback, in order
pub struct Captured<T>(Rc<RefCell<Vec<T>>>);

impl<T: 'static> Captured<T> {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn sink(&self) -> Rc<RefCell<Vec<T>>> {
        self.0.clone()
    }

    pub fn count(&self) -> usize {
        self.0.borrow().len()
    }

    /// The single value delivered; panics unless exactly one was
    pub fn single(&self) -> T {
        let mut values = self.0.borrow_mut();
        assert_eq!(values.len(), 1, "expected exactly one callback");
        values.remove(0)
    }
}

pub fn read_file(fs: &Filesystem, path: &str) -> (FsError, Vec<u8>) {
    let captured = Captured::new();
    let sink = captured.sink();
    fs.read_file(path, move |err, contents| {
        sink.borrow_mut().push((err, contents.to_vec()));
    });
    captured.single()
}
