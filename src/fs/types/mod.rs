/*!
 * Filesystem Types
 * Value types shared by the backend, the event loop and the facade
 */

mod errors;
mod handle;
mod open_flags;
mod stats;

pub use errors::{errno_of, FsError};
pub use handle::{FileHandle, ReadBuffer};
pub use open_flags::{posix, OpenFlags, ReadOptions, WriteOptions};
pub use stats::{Stats, Timespec};
