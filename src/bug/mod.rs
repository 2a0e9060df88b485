/*!
 * Bug Reporting
 * Records internal-invariant violations and tracks unchecked ones
 *
 * Every bug is written to the sinks at the call site, so a consumer can tell
 * a fatal run from a non-fatal one even if the process later dies without
 * reaching a checkpoint.
 */

use crate::bus::EventBus;
use crate::events::Payload;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Message recorded when unchecked bugs escalate at session finish
pub const UNCHECKED_BUG_MESSAGE: &str =
    "on exit(): had bug() call(s) in this process without explicit BUG_if_bug()";

/// Bug bookkeeping for one session
#[derive(Debug, Default)]
pub struct BugReporter {
    pending: AtomicU64,
    total: AtomicU64,
}

impl BugReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-fatal bug and flush it out immediately
    pub fn bug(&self, bus: &EventBus, thread: Option<&str>, message: &str) {
        self.record(bus, thread, message);
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a bug without marking it pending; used by the fatal path
    pub fn record(&self, bus: &EventBus, thread: Option<&str>, message: &str) {
        self.total.fetch_add(1, Ordering::Relaxed);
        bus.emit(
            thread,
            Payload::Bug {
                message: message.to_string(),
            },
        );
        bus.flush();
        debug!(message, "bug recorded");
    }

    /// Clear the pending count, returning how many bugs were unchecked
    pub fn take_pending(&self) -> u64 {
        self.pending.swap(0, Ordering::SeqCst)
    }

    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Bugs recorded over the session's lifetime
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
