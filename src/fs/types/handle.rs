/*!
 * File Handles and Read Buffers
 */

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for an open file
///
/// Owned by the call chain that opened it until it is closed; never reuse
/// a handle after close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(i32);

impl FileHandle {
    /// Failure sentinel returned alongside an open error
    pub const INVALID: FileHandle = FileHandle(-1);

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}

/// One chunk read from a file at a given offset
///
/// The buffer is allocated at exactly the requested length. Only the first
/// `len()` bytes were filled by the read; anything past that is not data.
#[derive(Debug)]
pub struct ReadBuffer {
    data: BytesMut,
    filled: usize,
    offset: u64,
}

impl ReadBuffer {
    /// Allocate a buffer for a read of `len` bytes at `offset`
    pub fn new(len: usize, offset: u64) -> Self {
        Self {
            data: BytesMut::zeroed(len),
            filled: 0,
            offset,
        }
    }

    /// Whole allocation, for the primitive to read into
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    /// Record how many bytes the read produced
    pub(crate) fn set_filled(&mut self, filled: usize) {
        self.filled = filled.min(self.data.len());
    }

    /// Valid bytes
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Number of valid bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.filled
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// A zero-byte read of a non-zero request means end of file
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.filled == 0 && !self.data.is_empty()
    }

    /// Requested length
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// File offset the read was issued at
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Keep only the valid bytes
    pub fn freeze(mut self) -> Bytes {
        self.data.truncate(self.filled);
        self.data.freeze()
    }
}
