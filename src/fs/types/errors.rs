/*!
 * Filesystem Error Signal
 * Result-code derived error values delivered alongside operation results
 */

use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error signal delivered with every filesystem callback
///
/// The default value means "no error". An operation populates it when,
/// and only when, the primitive reports a negative result code: `code` holds
/// that result (`-errno`) and `message` the platform error name (`ENOENT`).
///
/// Callers must check [`FsError::is_error`] before trusting the value that
/// accompanies it.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[error("{message} ({code})")]
#[serde(rename_all = "snake_case")]
pub struct FsError {
    pub message: String,
    pub code: i32,
}

impl FsError {
    /// The "no error" value
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Derive an error signal from a primitive result code
    ///
    /// Non-negative results are successes.
    #[must_use]
    pub fn from_result(result: i64) -> Self {
        if result >= 0 {
            return Self::none();
        }
        let errno = result
            .checked_neg()
            .and_then(|code| i32::try_from(code).ok())
            .unwrap_or(Errno::EOVERFLOW as i32);
        Self::from_errno(Errno::from_raw(errno))
    }

    /// Build an error signal for an errno value
    #[must_use]
    pub fn from_errno(errno: Errno) -> Self {
        Self {
            message: format!("{:?}", errno),
            code: -(errno as i32),
        }
    }

    /// True when this signal carries a failure
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.message.is_empty() || self.code != 0
    }

    /// The errno this signal was derived from, if any
    #[must_use]
    pub fn errno(&self) -> Option<Errno> {
        if self.code >= 0 {
            return None;
        }
        self.code.checked_neg().map(Errno::from_raw)
    }

    /// Keep the first failure of two
    ///
    /// Used where a later stage (close) must not overwrite an earlier error.
    #[must_use]
    pub fn or(self, later: FsError) -> Self {
        if self.is_error() {
            self
        } else {
            later
        }
    }

    /// Convert into a `Result`, pairing success with `value`
    pub fn into_result<T>(self, value: T) -> Result<T, FsError> {
        if self.is_error() {
            Err(self)
        } else {
            Ok(value)
        }
    }
}

impl From<Errno> for FsError {
    fn from(errno: Errno) -> Self {
        Self::from_errno(errno)
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        Self::from_errno(errno_of(&err))
    }
}

/// Map an I/O error onto the errno it carries (EIO when it carries none)
pub fn errno_of(err: &std::io::Error) -> Errno {
    err.raw_os_error()
        .map(Errno::from_raw)
        .unwrap_or(Errno::EIO)
}
