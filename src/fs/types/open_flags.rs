/*!
 * Open Flags and Options
 * Flags for opening files plus the whole-file read/write option sets
 */

use super::errors::FsError;
use crate::core::limits::{DEFAULT_READ_MODE, DEFAULT_WRITE_MODE};
use nix::errno::Errno;
use serde::{Deserialize, Serialize};

/// POSIX open(2) flag values, in the host platform's numbering
pub mod posix {
    use nix::fcntl::OFlag;

    pub const O_RDONLY: u32 = OFlag::O_RDONLY.bits() as u32;
    pub const O_WRONLY: u32 = OFlag::O_WRONLY.bits() as u32;
    pub const O_RDWR: u32 = OFlag::O_RDWR.bits() as u32;
    pub const O_ACCMODE: u32 = OFlag::O_ACCMODE.bits() as u32;
    pub const O_CREAT: u32 = OFlag::O_CREAT.bits() as u32;
    pub const O_EXCL: u32 = OFlag::O_EXCL.bits() as u32;
    pub const O_TRUNC: u32 = OFlag::O_TRUNC.bits() as u32;
    pub const O_APPEND: u32 = OFlag::O_APPEND.bits() as u32;
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// File open flags (only true flags are serialized)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct OpenFlags {
    #[serde(skip_serializing_if = "is_false")]
    pub read: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub write: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub append: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub truncate: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create_new: bool,
}

impl OpenFlags {
    #[inline]
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn write_only() -> Self {
        Self {
            write: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Add the create-if-missing flag
    #[inline]
    #[must_use]
    pub fn with_create(mut self) -> Self {
        self.create = true;
        self
    }

    /// Add the truncate flag
    #[inline]
    #[must_use]
    pub fn with_truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Add the append flag
    #[inline]
    #[must_use]
    pub fn with_append(mut self) -> Self {
        self.append = true;
        self
    }

    /// Check if any write operation is possible
    #[inline]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.write || self.append
    }

    /// Check if this will create a file
    #[inline]
    #[must_use]
    pub const fn will_create(&self) -> bool {
        self.create || self.create_new
    }

    /// Convert from POSIX flags (O_RDONLY, O_WRONLY, O_RDWR, ...)
    pub fn from_posix(flags: u32) -> Self {
        let (read, write) = match flags & posix::O_ACCMODE {
            posix::O_WRONLY => (false, true),
            posix::O_RDWR => (true, true),
            _ => (true, false),
        };

        Self {
            read,
            write,
            append: flags & posix::O_APPEND != 0,
            truncate: flags & posix::O_TRUNC != 0,
            create: flags & posix::O_CREAT != 0,
            create_new: flags & posix::O_EXCL != 0,
        }
    }

    /// Convert to POSIX flags
    pub fn to_posix(&self) -> u32 {
        let mut flags = match (self.read, self.is_writable()) {
            (true, true) => posix::O_RDWR,
            (false, true) => posix::O_WRONLY,
            _ => posix::O_RDONLY,
        };

        if self.append {
            flags |= posix::O_APPEND;
        }
        if self.truncate {
            flags |= posix::O_TRUNC;
        }
        if self.create {
            flags |= posix::O_CREAT;
        }
        if self.create_new {
            flags |= posix::O_EXCL;
        }

        flags
    }

    /// Validate flag combinations
    #[must_use = "validation result must be checked"]
    pub fn validate(&self) -> Result<(), FsError> {
        if self.create_new && !self.is_writable() {
            return Err(FsError::from_errno(Errno::EINVAL));
        }
        if self.truncate && !self.write {
            return Err(FsError::from_errno(Errno::EINVAL));
        }
        if self.append && self.truncate {
            return Err(FsError::from_errno(Errno::EINVAL));
        }
        Ok(())
    }
}

/// Options for whole-file reads
///
/// Defaults to create-or-open read-write with owner read/write permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadOptions {
    pub flags: OpenFlags,
    pub mode: u32,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            flags: OpenFlags::read_write().with_create(),
            mode: DEFAULT_READ_MODE,
        }
    }
}

/// Options for whole-file writes
///
/// Defaults to create-truncate write-only, readable by everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteOptions {
    pub flags: OpenFlags,
    pub mode: u32,
}

impl WriteOptions {
    /// Append instead of truncating
    #[must_use]
    pub fn append() -> Self {
        Self {
            flags: OpenFlags::write_only().with_create().with_append(),
            mode: DEFAULT_WRITE_MODE,
        }
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            flags: OpenFlags::write_only().with_create().with_truncate(),
            mode: DEFAULT_WRITE_MODE,
        }
    }
}
