/*!
 * Core Module
 * Shared limits and configuration
 */

pub mod config;
pub mod limits;

pub use config::{ConfigError, DriveMode, FsConfig};
