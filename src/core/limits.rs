/*!
 * System Limits and Constants
 *
 * Centralized location for queue sizes, chunk sizes and default modes.
 *
 * ## Conventions
 * - Performance-sensitive constants are marked with [PERF]
 * - POSIX-compatible values are marked with [POSIX-COMPAT]
 */

use std::time::Duration;

// =============================================================================
// READ / WRITE CHUNKING
// =============================================================================

/// Chunk size for whole-file reads and writes (8KB)
/// [PERF] Bounds per-request allocation regardless of file size
pub const MAGIC_BUFFER_SIZE: usize = 8192;

/// Upper bound accepted for a configured chunk size (16MB)
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// EVENT LOOP
// =============================================================================

/// Submission queue size
/// [PERF] Must be power of 2 for efficient ring buffer
pub const DEFAULT_SQ_SIZE: usize = 256;

/// Submissions flushed to the worker pool per loop iteration
/// [PERF] Amortizes flush overhead without starving completion dispatch
pub const SUBMISSION_BATCH_SIZE: usize = 32;

/// Default number of blocking filesystem workers
/// Same as the libuv threadpool default
pub const DEFAULT_FS_WORKERS: usize = 4;

/// Upper bound on filesystem workers
pub const MAX_FS_WORKERS: usize = 128;

/// Operations slower than this are logged as slow
pub const SLOW_OPERATION_THRESHOLD: Duration = Duration::from_millis(10);

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Default creation mode for whole-file reads (rw-------)
/// [POSIX-COMPAT] S_IRUSR | S_IWUSR
pub const DEFAULT_READ_MODE: u32 = 0o600;

/// Default creation mode for whole-file writes (rw-r--r--)
/// [POSIX-COMPAT] S_IRUSR | S_IWUSR | S_IRGRP | S_IROTH
pub const DEFAULT_WRITE_MODE: u32 = 0o644;
