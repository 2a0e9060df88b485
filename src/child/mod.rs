/*!
 * Child Process Tracking
 * Records spawn/exec/exit of child processes and hands each child its SID
 */

use crate::bus::EventBus;
use crate::core::errors::Trace2Error;
use crate::core::limits::{CHILD_FAILURE_CODE, PARENT_SID_ENV, SIGNAL_EXIT_BASE};
use crate::core::types::{ChildId, ExecId, ExitCode, Trace2Result};
use crate::events::Payload;
use crate::identity::{encode_for_environment, SessionId, SidAllocator};
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// A started child whose exit has not been recorded yet
///
/// Consumed by completion, so each child produces exactly one `child_exit`.
#[derive(Debug)]
pub struct ChildHandle {
    child_id: ChildId,
    sid: SessionId,
    argv: Vec<String>,
    started: Instant,
    process: Option<Child>,
}

impl ChildHandle {
    #[inline]
    pub fn child_id(&self) -> ChildId {
        self.child_id
    }

    #[inline]
    pub fn sid(&self) -> &SessionId {
        &self.sid
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// OS process id, when the tracker launched the process itself
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(Child::id)
    }

    /// Environment entry to hand to a child launched by the caller
    pub fn env(&self) -> (&'static str, String) {
        (PARENT_SID_ENV, encode_for_environment(&self.sid))
    }
}

/// Map a child's exit status to a single code
///
/// Signal deaths become `128 + signal` on Unix.
pub fn exit_code_of(status: ExitStatus) -> ExitCode {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return SIGNAL_EXIT_BASE + signal;
        }
    }
    CHILD_FAILURE_CODE
}

fn command_for(argv: &[String], sid: &SessionId) -> Trace2Result<Command> {
    let (program, args) = argv.split_first().ok_or(Trace2Error::EmptyCommandLine)?;
    let mut command = Command::new(program);
    command
        .args(args)
        .env(PARENT_SID_ENV, encode_for_environment(sid));
    Ok(command)
}

/// Child process tracker for one session
#[derive(Debug)]
pub struct ChildProcessTracker {
    next_child: AtomicU32,
    next_exec: AtomicU32,
}

impl ChildProcessTracker {
    pub fn new() -> Self {
        Self {
            next_child: AtomicU32::new(0),
            next_exec: AtomicU32::new(0),
        }
    }

    /// Record a child the caller will launch itself
    ///
    /// Emits `child_start`; inject [`ChildHandle::env`] into the child.
    pub fn register(
        &self,
        bus: &EventBus,
        allocator: &SidAllocator,
        parent: &SessionId,
        thread: Option<&str>,
        argv: &[String],
    ) -> Trace2Result<ChildHandle> {
        if argv.is_empty() {
            return Err(Trace2Error::EmptyCommandLine);
        }

        let child_id = self.next_child.fetch_add(1, Ordering::SeqCst);
        let sid = allocator.derive_child(parent);
        bus.emit(
            thread,
            Payload::ChildStart {
                child_id,
                child_sid: sid.to_string(),
                argv: argv.to_vec(),
            },
        );
        debug!(child_id, child_sid = %sid, program = %argv[0], "child registered");

        Ok(ChildHandle {
            child_id,
            sid,
            argv: argv.to_vec(),
            started: Instant::now(),
            process: None,
        })
    }

    /// Register and launch a child with its SID in the environment
    ///
    /// A launch failure is recorded as `child_exit` with code -1 and
    /// returned to the caller.
    pub fn spawn(
        &self,
        bus: &EventBus,
        allocator: &SidAllocator,
        parent: &SessionId,
        thread: Option<&str>,
        argv: &[String],
    ) -> Trace2Result<ChildHandle> {
        let mut handle = self.register(bus, allocator, parent, thread, argv)?;
        let mut command = command_for(&handle.argv, &handle.sid)?;

        match command.spawn() {
            Ok(process) => {
                handle.process = Some(process);
                Ok(handle)
            }
            Err(source) => {
                let program = handle.argv[0].clone();
                warn!(program = %program, error = %source, "child spawn failed");
                self.complete(bus, thread, handle, CHILD_FAILURE_CODE);
                Err(Trace2Error::SpawnFailed { program, source })
            }
        }
    }

    /// Record a child's termination
    pub fn complete(
        &self,
        bus: &EventBus,
        thread: Option<&str>,
        handle: ChildHandle,
        code: ExitCode,
    ) {
        bus.emit(
            thread,
            Payload::ChildExit {
                child_id: handle.child_id,
                child_sid: handle.sid.to_string(),
                pid: handle.pid(),
                code,
                elapsed: handle.started.elapsed().as_secs_f64(),
            },
        );
    }

    /// Wait for a launched child and record its exit
    ///
    /// Handles from [`register`](Self::register) have no process to wait
    /// for; they fail with `NotLaunched` and nothing is recorded.
    pub fn wait(
        &self,
        bus: &EventBus,
        thread: Option<&str>,
        mut handle: ChildHandle,
    ) -> Trace2Result<ExitCode> {
        let status = match handle.process.as_mut() {
            Some(process) => process.wait(),
            None => {
                return Err(Trace2Error::NotLaunched {
                    child_id: handle.child_id,
                })
            }
        };

        match status {
            Ok(status) => {
                let code = exit_code_of(status);
                self.complete(bus, thread, handle, code);
                Ok(code)
            }
            Err(source) => {
                let child_id = handle.child_id;
                self.complete(bus, thread, handle, CHILD_FAILURE_CODE);
                Err(Trace2Error::WaitFailed { child_id, source })
            }
        }
    }

    /// Replace the current process image with `argv`
    ///
    /// A successful replacement never returns. On failure `exec_result`
    /// records -1 and the error is returned. Where exec is unavailable it is
    /// emulated by running the program and returning its exit code.
    pub fn exec(
        &self,
        bus: &EventBus,
        allocator: &SidAllocator,
        parent: &SessionId,
        thread: Option<&str>,
        argv: &[String],
    ) -> Trace2Result<ExitCode> {
        if argv.is_empty() {
            return Err(Trace2Error::EmptyCommandLine);
        }

        let exec_id: ExecId = self.next_exec.fetch_add(1, Ordering::SeqCst);
        bus.emit(
            thread,
            Payload::Exec {
                exec_id,
                argv: argv.to_vec(),
            },
        );

        let sid = allocator.derive_child(parent);
        let mut command = command_for(argv, &sid)?;
        // Nothing after a successful exec runs, so make the trail durable now
        bus.flush();

        let outcome = Self::replace_image(&mut command);
        let code = match &outcome {
            Ok(code) => *code,
            Err(_) => CHILD_FAILURE_CODE,
        };
        bus.emit(thread, Payload::ExecResult { exec_id, code });

        outcome.map_err(|source| Trace2Error::ExecFailed {
            program: argv[0].clone(),
            source,
        })
    }

    #[cfg(unix)]
    fn replace_image(command: &mut Command) -> std::io::Result<ExitCode> {
        use std::os::unix::process::CommandExt;
        Err(command.exec())
    }

    #[cfg(not(unix))]
    fn replace_image(command: &mut Command) -> std::io::Result<ExitCode> {
        command.status().map(exit_code_of)
    }
}

impl Default for ChildProcessTracker {
    fn default() -> Self {
        Self::new()
    }
}
