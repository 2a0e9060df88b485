/*!
 * Limits and Constants
 *
 * Centralized location for trace2-wide limits, exit codes, and
 * environment variable names.
 */

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Carries the encoded SID from a spawning process to its child
pub const PARENT_SID_ENV: &str = "TRACE2_PARENT_SID";

/// Target for the JSON-lines event format
pub const EVENT_TARGET_ENV: &str = "TRACE2_EVENT";

/// Target for the human-readable format
pub const NORMAL_TARGET_ENV: &str = "TRACE2_NORMAL";

/// Target for the columnar performance format
pub const PERF_TARGET_ENV: &str = "TRACE2_PERF";

/// Switches crate diagnostics to JSON output
pub const LOG_JSON_ENV: &str = "TRACE2_LOG_JSON";

// =============================================================================
// SESSION IDENTITY
// =============================================================================

/// Separator between SID segments in the encoded form
pub const SID_SEPARATOR: char = '/';

/// Deepest process tree an inherited SID may describe.
/// Anything deeper is treated as corrupt and replaced by a fresh root.
pub const MAX_SID_DEPTH: usize = 64;

/// Longest single segment accepted from the environment
pub const MAX_SEGMENT_LEN: usize = 128;

// =============================================================================
// EVENT SCHEMA
// =============================================================================

/// Version of the event schema reported in the `version` event
pub const EVENT_FORMAT_VERSION: &str = "3";

// =============================================================================
// SINKS
// =============================================================================

/// Attempts per event before a sink is disabled
/// Only transient errors (Interrupted, WouldBlock) are retried
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;

// =============================================================================
// EXIT CODES
// =============================================================================

/// Exit code used by the fatal bug paths
pub const BUG_EXIT_CODE: i32 = 99;

/// Exit code used when a usage error aborts the program ("die")
pub const DIE_EXIT_CODE: i32 = 128;

/// Exit code of an unwinding panic, matching the Rust runtime
pub const PANIC_EXIT_CODE: i32 = 101;

/// Exit code recorded for a child that could not be started or reaped
pub const CHILD_FAILURE_CODE: i32 = -1;

/// Portion of an exit code the operating system reports to a parent
pub const EXIT_STATUS_MASK: i32 = 0xff;

/// Offset added to a signal number when a child is killed by a signal
pub const SIGNAL_EXIT_BASE: i32 = 128;
