/*!
 * Trace2 Session
 * Owns the identity, event bus and registries of one instrumented process
 * and drives every termination path through a single finish sequence
 */

mod builder;
mod guard;

pub use builder::Trace2Builder;
pub use guard::ExitGuard;

use crate::bug::{BugReporter, UNCHECKED_BUG_MESSAGE};
use crate::bus::{BusStats, EventBus};
use crate::child::{ChildHandle, ChildProcessTracker};
use crate::config::Trace2Config;
use crate::core::limits::{DIE_EXIT_CODE, EVENT_FORMAT_VERSION, EXIT_STATUS_MASK};
use crate::core::types::{ExitCode, ExitHandler, Trace2Result};
use crate::counter::CounterRegistry;
use crate::events::Payload;
use crate::identity::{SessionId, SidAllocator};
use crate::thread::ThreadRegistry;
use crate::timer::TimerRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// An instrumented process
///
/// Create one per process with [`Trace2::builder`]; the creating thread is
/// registered as `main`. All operations take `&self` and are safe to call
/// from any thread.
pub struct Trace2 {
    sid: SessionId,
    config: Trace2Config,
    bus: EventBus,
    allocator: SidAllocator,
    threads: ThreadRegistry,
    timers: TimerRegistry,
    counters: CounterRegistry,
    children: ChildProcessTracker,
    bugs: BugReporter,
    finished: Mutex<Option<ExitCode>>,
    exit_handler: ExitHandler,
}

impl Trace2 {
    pub fn builder() -> Trace2Builder {
        Trace2Builder::new()
    }

    /// Session with the given configuration and the inherited parent SID
    pub fn initialize(config: Trace2Config) -> Arc<Self> {
        Trace2Builder::new().with_config(config).build()
    }

    #[inline]
    pub fn sid(&self) -> &SessionId {
        &self.sid
    }

    #[inline]
    pub fn config(&self) -> &Trace2Config {
        &self.config
    }

    pub fn bus_stats(&self) -> BusStats {
        self.bus.stats()
    }

    /// Code of the finished session, if it has finished
    pub fn finished_code(&self) -> Option<ExitCode> {
        *self.finished.lock()
    }

    /// Label of the calling thread, if it is registered
    pub fn thread_label(&self) -> Option<String> {
        self.threads.current_label()
    }

    fn emit(&self, payload: Payload) {
        let thread = self.threads.current_label();
        self.bus.emit(thread.as_deref(), payload);
    }

    fn anomaly(&self, message: String) {
        debug!(message = %message, "trace2 anomaly");
        self.emit(Payload::Anomaly { message });
    }

    fn unregistered(&self, operation: &str, id: &str) {
        let state = if self.threads.has_exited() {
            "has exited"
        } else {
            "is not registered"
        };
        self.anomaly(format!(
            "{}('{}') ignored: calling thread {}",
            operation, id, state
        ));
    }

    /// Record the command line; emits `version` then `start`
    pub fn cmd_start<I, S>(&self, argv: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emit(Payload::Version {
            evt: EVENT_FORMAT_VERSION.to_string(),
            exe: env!("CARGO_PKG_VERSION").to_string(),
        });
        self.emit(Payload::Start {
            argv: argv.into_iter().map(Into::into).collect(),
        });
    }

    pub fn cmd_name(&self, name: &str) {
        self.emit(Payload::CmdName {
            name: name.to_string(),
        });
    }

    pub fn def_param(&self, key: &str, value: &str) {
        self.emit(Payload::DefParam {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    pub fn data(&self, category: &str, key: &str, value: &str) {
        self.emit(Payload::Data {
            category: category.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Record a non-fatal error message
    pub fn error(&self, message: &str) {
        self.emit(Payload::Error {
            message: message.to_string(),
        });
    }

    /// Record an error and terminate with the conventional fatal code
    pub fn die(&self, message: &str) -> ! {
        self.error(message);
        self.exit(DIE_EXIT_CODE)
    }

    /// Register the calling thread as a worker named `name`
    ///
    /// A second registration without an intervening exit is an anomaly and
    /// leaves the existing registration in place.
    pub fn thread_start(&self, name: &str) -> Trace2Result<String> {
        match self.threads.start(name) {
            Ok(label) => {
                debug!(thread = %label, "thread registered");
                Ok(label)
            }
            Err(e) => {
                self.anomaly(format!("thread_start('{}') ignored: {}", name, e));
                Err(e)
            }
        }
    }

    /// Finalize the calling worker thread
    ///
    /// Its `th_timer`/`th_counter` summaries are emitted and its partials are
    /// folded into the aggregates before this returns.
    pub fn thread_exit(&self) {
        if self.threads.with_current(|ctx| ctx.is_main()) == Some(true) {
            self.anomaly("thread_exit() ignored on the main thread".to_string());
            return;
        }
        match self.threads.take_current() {
            Some(context) => context.finish(&self.bus, &self.timers, &self.counters),
            None => self.unregistered("thread_exit", ""),
        }
    }

    pub fn timer_start(&self, id: &str) {
        let now = Instant::now();
        if self
            .threads
            .with_current(|ctx| ctx.timer_start(&self.bus, id, now))
            .is_none()
        {
            self.unregistered("timer_start", id);
        }
    }

    pub fn timer_stop(&self, id: &str) {
        let now = Instant::now();
        if self
            .threads
            .with_current(|ctx| ctx.timer_stop(&self.bus, id, now))
            .is_none()
        {
            self.unregistered("timer_stop", id);
        }
    }

    pub fn counter_add(&self, id: &str, delta: i64) {
        if self
            .threads
            .with_current(|ctx| ctx.counter_add(&self.bus, id, delta))
            .is_none()
        {
            self.unregistered("counter_add", id);
        }
    }

    /// Record a child the caller launches itself
    ///
    /// Pass [`ChildHandle::env`] to the child and report its outcome with
    /// [`complete_child`](Self::complete_child).
    pub fn register_child(&self, argv: &[String]) -> Trace2Result<ChildHandle> {
        let thread = self.threads.current_label();
        self.children
            .register(&self.bus, &self.allocator, &self.sid, thread.as_deref(), argv)
    }

    pub fn complete_child(&self, handle: ChildHandle, code: ExitCode) {
        let thread = self.threads.current_label();
        self.children.complete(&self.bus, thread.as_deref(), handle, code);
    }

    /// Launch a child with a derived SID in its environment
    pub fn spawn_child(&self, argv: &[String]) -> Trace2Result<ChildHandle> {
        let thread = self.threads.current_label();
        self.children
            .spawn(&self.bus, &self.allocator, &self.sid, thread.as_deref(), argv)
    }

    pub fn wait_child(&self, handle: ChildHandle) -> Trace2Result<ExitCode> {
        let thread = self.threads.current_label();
        self.children.wait(&self.bus, thread.as_deref(), handle)
    }

    /// Spawn a child and wait for it
    pub fn run_child(&self, argv: &[String]) -> Trace2Result<ExitCode> {
        let handle = self.spawn_child(argv)?;
        self.wait_child(handle)
    }

    /// Replace the process image with `argv`
    ///
    /// Only returns if the replacement failed, or where exec is emulated.
    pub fn exec(&self, argv: &[String]) -> Trace2Result<ExitCode> {
        let thread = self.threads.current_label();
        self.children
            .exec(&self.bus, &self.allocator, &self.sid, thread.as_deref(), argv)
    }

    /// Record a non-fatal bug; see [`bug_if_bug`](Self::bug_if_bug)
    pub fn bug(&self, message: &str) {
        let thread = self.threads.current_label();
        self.bugs.bug(&self.bus, thread.as_deref(), message);
    }

    /// Record a bug and terminate with the bug exit code
    pub fn fatal_bug(&self, message: &str) -> ! {
        let thread = self.threads.current_label();
        self.bugs.take_pending();
        self.bugs.record(&self.bus, thread.as_deref(), message);
        self.exit(self.config.bug_exit_code)
    }

    /// Escalate to [`fatal_bug`](Self::fatal_bug) if `bug` was called
    /// since the last checkpoint
    pub fn bug_if_bug(&self, message: &str) {
        if self.bugs.pending() > 0 {
            self.fatal_bug(message);
        }
    }

    /// Bugs recorded and not yet checked
    pub fn pending_bugs(&self) -> u64 {
        self.bugs.pending()
    }

    /// Run the finish sequence and close the event stream
    ///
    /// Only the first call does any work; every call returns the code that
    /// was actually written to `exit`/`atexit`. That code is truncated to
    /// the 8 bits a parent process can observe, and becomes the bug exit
    /// code when unchecked bugs escalated.
    pub fn finish(&self, code: ExitCode) -> ExitCode {
        let mut finished = self.finished.lock();
        if let Some(code) = *finished {
            return code;
        }

        let thread = self.threads.current_label();
        let thread = thread.as_deref();

        if let Some(context) = self.threads.take_current() {
            context.finish(&self.bus, &self.timers, &self.counters);
        }

        let stragglers = self.threads.active();
        if stragglers > 0 {
            warn!(
                threads = stragglers,
                "trace2 finished with threads still registered; their partials are lost"
            );
            self.bus.emit(
                thread,
                Payload::Anomaly {
                    message: format!(
                        "{} thread(s) still registered at exit; their timers/counters were not folded",
                        stragglers
                    ),
                },
            );
        }

        for (id, stats) in self.timers.report() {
            self.bus.emit(thread, stats.aggregate_payload(&id));
        }
        for (id, total) in self.counters.report() {
            self.bus
                .emit(thread, crate::counter::aggregate_payload(&id, total));
        }

        let mut code = code & EXIT_STATUS_MASK;
        let unchecked = self.bugs.take_pending();
        if unchecked > 0 {
            self.bugs.record(&self.bus, thread, UNCHECKED_BUG_MESSAGE);
            code = self.config.bug_exit_code;
        }

        self.bus.flush_and_close(thread, code);
        *finished = Some(code);

        let stats = self.bus.stats();
        info!(
            sid = %self.sid,
            code,
            emitted = stats.events_emitted,
            dropped = stats.events_dropped,
            "trace2 session finished"
        );
        code
    }

    /// Finish and hand the effective code to the exit handler
    pub fn exit(&self, code: ExitCode) -> ! {
        let code = self.finish(code);
        (self.exit_handler)(code)
    }

    /// Record panics as `error` events before the previous hook runs
    pub fn install_panic_hook(self: &Arc<Self>) {
        guard::install_panic_hook(Arc::downgrade(self));
    }
}

impl std::fmt::Debug for Trace2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trace2")
            .field("sid", &self.sid)
            .field("bus", &self.bus)
            .field("finished", &self.finished_code())
            .finish()
    }
}
