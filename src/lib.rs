/*!
 * loopfs
 * Callback-driven filesystem operations over a single-threaded event loop
 */

pub mod backend;
pub mod core;
pub mod fs;
pub mod io;
pub mod monitoring;

// Re-exports
pub use backend::{IoBackend, LocalBackend, MemoryBackend};
pub use crate::core::{ConfigError, DriveMode, FsConfig};
pub use fs::{
    FileHandle, Filesystem, FsError, OpenFlags, ReadBuffer, ReadOptions, Stats, Timespec,
    WriteOptions,
};
pub use io::{EventLoop, LoopError, LoopStats, RunMode};
pub use monitoring::init_tracing;
