/*!
 * File Stats
 * Point-in-time stat snapshot
 */

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// File type mask and type bits of `st_mode`
const S_IFMT: u64 = 0o170_000;
const S_IFREG: u64 = 0o100_000;
const S_IFDIR: u64 = 0o040_000;
const S_IFLNK: u64 = 0o120_000;

/// Seconds + nanoseconds since the UNIX epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: i64,
}

impl Timespec {
    #[inline]
    #[must_use]
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Convert to `SystemTime` (pre-epoch values clamp to the epoch)
    #[must_use]
    pub fn to_system_time(self) -> SystemTime {
        if self.sec < 0 {
            return UNIX_EPOCH;
        }
        UNIX_EPOCH + Duration::new(self.sec as u64, self.nsec.clamp(0, 999_999_999) as u32)
    }
}

impl From<SystemTime> for Timespec {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, i64::from(d.subsec_nanos())),
            Err(e) => {
                let d = e.duration();
                Self::new(-(d.as_secs() as i64), -i64::from(d.subsec_nanos()))
            }
        }
    }
}

/// File stats snapshot
///
/// Immutable once produced. The read pipeline uses only `size`; the remaining
/// fields are carried for callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Stats {
    pub dev: u64,
    pub mode: u64,
    pub nlink: u64,
    pub uid: u64,
    pub gid: u64,
    pub rdev: u64,
    pub ino: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub flags: u64,
    pub gen: u64,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
    pub birthtime: Timespec,
}

impl Stats {
    /// Check if this is a regular file
    #[inline]
    #[must_use]
    pub const fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    /// Check if this is a directory
    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Check if this is a symbolic link
    #[inline]
    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }

    /// Permission bits only
    #[inline]
    #[must_use]
    pub const fn permissions(&self) -> u32 {
        (self.mode & 0o7777) as u32
    }

    /// Build stats from host metadata
    pub fn from_metadata(md: &std::fs::Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                dev: md.dev(),
                mode: u64::from(md.mode()),
                nlink: md.nlink(),
                uid: u64::from(md.uid()),
                gid: u64::from(md.gid()),
                rdev: md.rdev(),
                ino: md.ino(),
                size: md.size(),
                blksize: md.blksize(),
                blocks: md.blocks(),
                flags: 0,
                gen: 0,
                atime: Timespec::new(md.atime(), md.atime_nsec()),
                mtime: Timespec::new(md.mtime(), md.mtime_nsec()),
                ctime: Timespec::new(md.ctime(), md.ctime_nsec()),
                birthtime: md.created().map(Timespec::from).unwrap_or_default(),
            }
        }
        #[cfg(not(unix))]
        {
            let kind = if md.is_dir() { S_IFDIR } else { S_IFREG };
            let perms = if md.permissions().readonly() { 0o444 } else { 0o644 };
            Self {
                mode: kind | perms,
                nlink: 1,
                size: md.len(),
                atime: md.accessed().map(Timespec::from).unwrap_or_default(),
                mtime: md.modified().map(Timespec::from).unwrap_or_default(),
                ctime: md.modified().map(Timespec::from).unwrap_or_default(),
                birthtime: md.created().map(Timespec::from).unwrap_or_default(),
                ..Self::default()
            }
        }
    }
}
