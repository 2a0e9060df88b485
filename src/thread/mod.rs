/*!
 * Thread Contexts
 * Per-thread registration, timer/counter accumulation and finalization
 *
 * Each context lives in thread-local storage keyed by its session, so only
 * the owning thread can touch it. Aggregate registries only ever see the
 * finalized contribution handed over by `ThreadContext::finish`.
 */

use crate::bus::EventBus;
use crate::core::errors::Trace2Error;
use crate::core::types::Trace2Result;
use crate::counter::{self, CounterRegistry, ThreadCounters};
use crate::events::Payload;
use crate::timer::{ThreadTimers, TimerAnomaly, TimerRegistry};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Label of the thread that created the session
pub const MAIN_THREAD_LABEL: &str = "main";

static NEXT_REGISTRY_KEY: AtomicU64 = AtomicU64::new(1);

enum Slot {
    Active(ThreadContext),
    Exited,
}

thread_local! {
    static CONTEXTS: RefCell<HashMap<u64, Slot>> = RefCell::new(HashMap::new());
}

/// State of one registered thread
#[derive(Debug)]
pub struct ThreadContext {
    label: Arc<str>,
    is_main: bool,
    timers: ThreadTimers,
    counters: ThreadCounters,
}

impl ThreadContext {
    fn new(label: Arc<str>, is_main: bool) -> Self {
        Self {
            label,
            is_main,
            timers: ThreadTimers::new(),
            counters: ThreadCounters::new(),
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn is_main(&self) -> bool {
        self.is_main
    }

    pub fn timer_start(&mut self, bus: &EventBus, id: &str, now: Instant) {
        if let Some(anomaly) = self.timers.start(id, now) {
            self.anomaly(bus, anomaly.describe(id));
        }
    }

    pub fn timer_stop(&mut self, bus: &EventBus, id: &str, now: Instant) {
        if let Some(anomaly) = self.timers.stop(id, now) {
            self.anomaly(bus, anomaly.describe(id));
        }
    }

    pub fn counter_add(&mut self, bus: &EventBus, id: &str, delta: i64) {
        if let Some(overflow) = self.counters.add(id, delta) {
            self.anomaly(bus, overflow.describe());
        }
    }

    fn anomaly(&self, bus: &EventBus, message: String) {
        bus.emit(Some(&self.label), Payload::Anomaly { message });
    }

    /// Finalize this thread
    ///
    /// Open timers are reported and dropped, worker threads emit their
    /// `th_timer`/`th_counter` summaries, and the partials are folded into
    /// the aggregates before this returns.
    pub fn finish(self, bus: &EventBus, timers: &TimerRegistry, counters: &CounterRegistry) {
        let label = self.label;
        let summary = self.timers.finish();

        for id in &summary.still_running {
            bus.emit(
                Some(&label),
                Payload::Anomaly {
                    message: TimerAnomaly::StillRunning.describe(id),
                },
            );
        }

        for (id, stats) in &summary.stats {
            if !self.is_main {
                bus.emit(Some(&label), stats.thread_payload(id));
            }
            timers.fold(id, stats);
        }

        for (id, value) in self.counters.finish() {
            if !self.is_main {
                bus.emit(Some(&label), counter::thread_payload(&id, value));
            }
            if let Some(overflow) = counters.fold(&id, value) {
                bus.emit(
                    Some(&label),
                    Payload::Anomaly {
                        message: overflow.describe(),
                    },
                );
            }
        }

        debug!(thread = %label, "thread context finalized");
    }
}

/// Registration bookkeeping for one session
#[derive(Debug)]
pub struct ThreadRegistry {
    key: u64,
    next_seq: AtomicU32,
    active: AtomicUsize,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self {
            key: NEXT_REGISTRY_KEY.fetch_add(1, Ordering::Relaxed),
            next_seq: AtomicU32::new(1),
            active: AtomicUsize::new(0),
        }
    }

    /// Register the calling thread as the session's main thread
    pub fn register_main(&self) {
        let context = ThreadContext::new(Arc::from(MAIN_THREAD_LABEL), true);
        self.install(context);
    }

    /// Register the calling thread as a worker
    ///
    /// Returns the unique label, or an error if this thread is already
    /// registered and has not exited.
    pub fn start(&self, name: &str) -> Trace2Result<String> {
        if let Some(label) = self.current_label() {
            return Err(Trace2Error::ThreadAlreadyStarted { name: label });
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let label = format!("th{:02}:{}", seq, name);
        self.install(ThreadContext::new(Arc::from(label.as_str()), false));
        Ok(label)
    }

    fn install(&self, context: ThreadContext) {
        let installed = CONTEXTS
            .try_with(|contexts| {
                contexts
                    .borrow_mut()
                    .insert(self.key, Slot::Active(context));
            })
            .is_ok();
        if installed {
            self.active.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Run `f` against the calling thread's context, if it has one
    pub fn with_current<R>(&self, f: impl FnOnce(&mut ThreadContext) -> R) -> Option<R> {
        CONTEXTS
            .try_with(|contexts| match contexts.borrow_mut().get_mut(&self.key) {
                Some(Slot::Active(context)) => Some(f(context)),
                _ => None,
            })
            .ok()
            .flatten()
    }

    /// Detach the calling thread's context, leaving it marked exited
    pub fn take_current(&self) -> Option<ThreadContext> {
        let taken = CONTEXTS
            .try_with(|contexts| {
                let mut contexts = contexts.borrow_mut();
                match contexts.insert(self.key, Slot::Exited) {
                    Some(Slot::Active(context)) => Some(context),
                    Some(Slot::Exited) => None,
                    None => {
                        contexts.remove(&self.key);
                        None
                    }
                }
            })
            .ok()
            .flatten();
        if taken.is_some() {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
        taken
    }

    pub fn current_label(&self) -> Option<String> {
        self.with_current(|context| context.label().to_string())
    }

    /// True when the calling thread registered and then exited
    pub fn has_exited(&self) -> bool {
        CONTEXTS
            .try_with(|contexts| matches!(contexts.borrow().get(&self.key), Some(Slot::Exited)))
            .unwrap_or(false)
    }

    /// Threads registered and not yet finalized
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadRegistry {
    fn drop(&mut self) {
        let key = self.key;
        let _ = CONTEXTS.try_with(|contexts| {
            contexts.borrow_mut().remove(&key);
        });
    }
}
