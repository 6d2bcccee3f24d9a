/*!
 * Filesystem Configuration
 *
 * Chunk sizes, worker pool sizing and loop drive policy.
 */

use super::limits::{
    DEFAULT_FS_WORKERS, DEFAULT_SQ_SIZE, MAGIC_BUFFER_SIZE, MAX_CHUNK_SIZE, MAX_FS_WORKERS,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// How public async calls treat the event loop after submitting work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Pump the loop until idle unless it is already running
    #[default]
    Standalone,
    /// Never pump; an embedding application runs the loop
    External,
}

impl FromStr for DriveMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standalone" => Ok(DriveMode::Standalone),
            "external" => Ok(DriveMode::External),
            other => Err(ConfigError::InvalidValue {
                key: "drive_mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} out of range: {value} (allowed 1..={max})")]
    OutOfRange {
        key: &'static str,
        value: usize,
        max: usize,
    },
}

/// Filesystem facade configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct FsConfig {
    /// Bytes requested per read/write in whole-file pipelines
    pub chunk_size: usize,
    /// Blocking worker threads executing filesystem operations
    pub workers: usize,
    /// Submission queue capacity
    pub sq_size: usize,
    /// Loop drive policy
    pub drive_mode: DriveMode,
}

impl FsConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            chunk_size: MAGIC_BUFFER_SIZE,
            workers: DEFAULT_FS_WORKERS,
            sq_size: DEFAULT_SQ_SIZE,
            drive_mode: DriveMode::Standalone,
        }
    }

    /// Configuration for an application that runs the loop itself
    pub fn external() -> Self {
        Self {
            drive_mode: DriveMode::External,
            ..Self::new()
        }
    }

    /// Override the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Override the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Override the drive mode
    pub fn with_drive_mode(mut self, drive_mode: DriveMode) -> Self {
        self.drive_mode = drive_mode;
        self
    }

    /// Load configuration from the environment, falling back to defaults
    ///
    /// Environment variables:
    /// - LOOPFS_CHUNK_SIZE: bytes per chunk (default: 8192)
    /// - LOOPFS_WORKERS: worker threads (default: 4)
    /// - LOOPFS_SQ_SIZE: submission queue capacity (default: 256)
    /// - LOOPFS_DRIVE_MODE: `standalone` or `external` (default: standalone)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Some(value) = env_usize("LOOPFS_CHUNK_SIZE", "chunk_size")? {
            config.chunk_size = value;
        }
        if let Some(value) = env_usize("LOOPFS_WORKERS", "workers")? {
            config.workers = value;
        }
        if let Some(value) = env_usize("LOOPFS_SQ_SIZE", "sq_size")? {
            config.sq_size = value;
        }
        if let Ok(value) = std::env::var("LOOPFS_DRIVE_MODE") {
            config.drive_mode = value.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate ranges
    #[must_use = "validation result must be checked"]
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("chunk_size", self.chunk_size, MAX_CHUNK_SIZE)?;
        check_range("workers", self.workers, MAX_FS_WORKERS)?;
        check_range("sq_size", self.sq_size, usize::MAX)?;
        Ok(())
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_usize(var: &str, key: &'static str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(None),
    }
}

fn check_range(key: &'static str, value: usize, max: usize) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::OutOfRange { key, value, max });
    }
    Ok(())
}
