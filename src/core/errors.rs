/*!
 * Error Types
 * Centralized error handling with thiserror and miette diagnostics
 */

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of the trace2 API
///
/// Misuse of timers and counters never produces one of these; it is
/// recorded as an `anomaly` event instead.
#[derive(Error, Debug, Diagnostic)]
pub enum Trace2Error {
    #[error("Thread '{name}' is already registered")]
    #[diagnostic(
        code(trace2::thread_already_started),
        help("Call thread_exit() before registering the same thread again.")
    )]
    ThreadAlreadyStarted { name: String },

    #[error("Empty command line")]
    #[diagnostic(
        code(trace2::empty_command_line),
        help("A child or exec request needs at least a program name.")
    )]
    EmptyCommandLine,

    #[error("Failed to spawn '{program}': {source}")]
    #[diagnostic(
        code(trace2::spawn_failed),
        help("Check that the program exists and is executable.")
    )]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for child {child_id}: {source}")]
    #[diagnostic(code(trace2::wait_failed))]
    WaitFailed {
        child_id: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Child {child_id} was registered but never launched")]
    #[diagnostic(
        code(trace2::not_launched),
        help("Record the outcome of a caller-launched child with complete_child().")
    )]
    NotLaunched { child_id: u32 },

    #[error("Failed to exec '{program}': {source}")]
    #[diagnostic(
        code(trace2::exec_failed),
        help("The process image was not replaced; the caller still owns the process.")
    )]
    ExecFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open sink at {}: {source}", path.display())]
    #[diagnostic(
        code(trace2::sink_open),
        help("Check that the target directory exists and is writable.")
    )]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid trace target: {0}")]
    #[diagnostic(
        code(trace2::invalid_target),
        help("Use 1/true for stderr, 0/false to disable, or an absolute path.")
    )]
    InvalidTarget(String),
}
