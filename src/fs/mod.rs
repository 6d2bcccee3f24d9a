/*!
 * Filesystem Facade
 *
 * Callback-based async operations, whole-file pipelines and their blocking
 * counterparts over one event loop.
 */

mod ops;
mod read_file;
mod sync;
pub mod types;
mod write_file;

pub use types::{
    FileHandle, FsError, OpenFlags, ReadBuffer, ReadOptions, Stats, Timespec, WriteOptions,
};

use crate::backend::IoBackend;
use crate::core::config::{DriveMode, FsConfig};
use crate::io::{EventLoop, LoopError, RunMode, WeakEventLoop};
use std::sync::Arc;
use tracing::error;

/// Filesystem access over an explicitly passed event loop
///
/// Every async operation submits exactly one request per step and reports
/// through exactly one callback invocation. Whether the call also pumps the
/// loop is decided by the configured [`DriveMode`]: standalone facades run
/// the loop until idle unless it is already running; external ones leave that
/// to the application.
#[derive(Clone)]
pub struct Filesystem {
    event_loop: EventLoop,
    config: FsConfig,
}

impl Filesystem {
    pub fn new(event_loop: EventLoop, config: FsConfig) -> Self {
        Self { event_loop, config }
    }

    /// Host filesystem with default configuration on a private loop
    pub fn local() -> Result<Self, LoopError> {
        Self::with_config(FsConfig::default())
    }

    /// Host filesystem on a private loop
    pub fn with_config(config: FsConfig) -> Result<Self, LoopError> {
        let event_loop = EventLoop::local(&config)?;
        Ok(Self::new(event_loop, config))
    }

    /// Custom backend on a private loop
    pub fn with_backend(backend: Arc<dyn IoBackend>, config: FsConfig) -> Result<Self, LoopError> {
        let event_loop = EventLoop::new(backend, &config)?;
        Ok(Self::new(event_loop, config))
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub(crate) fn downgrade(&self) -> WeakFilesystem {
        WeakFilesystem {
            event_loop: self.event_loop.downgrade(),
            config: self.config.clone(),
        }
    }

    pub(crate) fn backend(&self) -> &Arc<dyn IoBackend> {
        self.event_loop.backend()
    }

    /// Pump the loop after issuing work, unless someone else drives it
    pub(crate) fn drive(&self) {
        if self.config.drive_mode == DriveMode::External || self.event_loop.is_running() {
            return;
        }
        if let Err(e) = self.event_loop.run(RunMode::Default) {
            error!(loop_id = self.event_loop.id(), error = %e, "Event loop run failed");
        }
    }
}

/// Facade handle that does not own its loop
///
/// Pipelines parked in the loop's handler table hold this instead of a
/// [`Filesystem`], so dropping the last facade releases the loop, its
/// workers and the backend even with work still pending.
#[derive(Clone)]
pub(crate) struct WeakFilesystem {
    event_loop: WeakEventLoop,
    config: FsConfig,
}

impl WeakFilesystem {
    pub(crate) fn upgrade(&self) -> Option<Filesystem> {
        let event_loop = self.event_loop.upgrade()?;
        Some(Filesystem::new(event_loop, self.config.clone()))
    }
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("event_loop", &self.event_loop)
            .field("backend", &self.backend().name())
            .field("config", &self.config)
            .finish()
    }
}
