/*!
 * Core Types
 * Common types used across trace2
 */

/// Process exit code as reported in `exit`/`atexit` events
pub type ExitCode = i32;

/// Per-session sequence number of a tracked child process
pub type ChildId = u32;

/// Per-session sequence number of an exec attempt
pub type ExecId = u32;

/// Common result type for trace2 operations
pub type Trace2Result<T> = Result<T, super::errors::Trace2Error>;

/// Signature of the function that finally terminates the process
///
/// Defaults to [`std::process::exit`]; tests substitute a handler that
/// unwinds instead so the exit path can be observed in-process.
pub type ExitHandler = fn(ExitCode) -> !;
