/*!
 * Event Bus
 * Stamps payloads into events and fans them out to every live sink
 *
 * Design: emitters share a read lock on the sink list, so emission from many
 * threads proceeds in parallel (each sink serializes its own writes). The
 * final exit/atexit pair is written under the write lock, which guarantees
 * nothing can land between or after them.
 */

pub mod sinks;

use crate::core::types::ExitCode;
use crate::events::{Clock, Event, Payload};
use crate::identity::SessionId;
use parking_lot::RwLock;
use sinks::Sink;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Bus statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    pub events_emitted: u64,
    pub events_dropped: u64,
    pub live_sinks: usize,
    pub failed_sinks: usize,
}

struct SinkSlot {
    sink: Box<dyn Sink>,
    live: AtomicBool,
}

/// Event bus for one session
pub struct EventBus {
    sid: String,
    clock: Clock,
    sinks: RwLock<Vec<SinkSlot>>,
    opened: AtomicBool,
    closed: AtomicBool,
    emitted: AtomicU64,
    dropped: AtomicU64,
    max_write_attempts: u32,
}

impl EventBus {
    pub fn new(sid: &SessionId, clock: Clock, max_write_attempts: u32) -> Self {
        Self {
            sid: sid.to_string(),
            clock,
            sinks: RwLock::new(Vec::new()),
            opened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            emitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            max_write_attempts: max_write_attempts.max(1),
        }
    }

    #[inline]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    #[inline]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Install the session's sinks
    ///
    /// Only the first call has an effect; returns whether it was this one.
    pub fn open(&self, sinks: Vec<Box<dyn Sink>>) -> bool {
        if self.opened.swap(true, Ordering::SeqCst) {
            debug!(sid = %self.sid, "event bus already open");
            return false;
        }

        let mut slots = self.sinks.write();
        for sink in sinks {
            debug!(sink = sink.name(), "trace2 sink opened");
            slots.push(SinkSlot {
                sink,
                live: AtomicBool::new(true),
            });
        }
        true
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Emit one event to every live sink
    ///
    /// Returns once every sink has accepted or rejected the event. Events
    /// emitted after the final flush are dropped.
    pub fn emit(&self, thread: Option<&str>, payload: Payload) {
        let slots = self.sinks.read();
        // Checked under the lock: close() flips the flag before taking the
        // write lock, so nothing can slip in after atexit.
        if self.closed.load(Ordering::SeqCst) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(kind = %payload.kind(), "event dropped after close");
            return;
        }

        let event = Event::new(&self.sid, thread, &self.clock, payload);
        self.deliver(&slots, &event);
    }

    /// Flush every live sink without closing the bus
    pub fn flush(&self) {
        let slots = self.sinks.read();
        Self::flush_slots(&slots);
    }

    /// Write the terminal `exit`/`atexit` pair and flush
    ///
    /// Runs at most once per bus; later calls return `false`.
    pub fn flush_and_close(&self, thread: Option<&str>, code: ExitCode) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let slots = self.sinks.write();
        let elapsed = self.clock.elapsed().as_secs_f64();
        for payload in [
            Payload::Exit { code, elapsed },
            Payload::Atexit { code, elapsed },
        ] {
            let event = Event::new(&self.sid, thread, &self.clock, payload);
            self.deliver(&slots, &event);
        }
        Self::flush_slots(&slots);

        debug!(sid = %self.sid, code, "event bus closed");
        true
    }

    pub fn stats(&self) -> BusStats {
        let slots = self.sinks.read();
        let live = slots
            .iter()
            .filter(|slot| slot.live.load(Ordering::Relaxed))
            .count();
        BusStats {
            events_emitted: self.emitted.load(Ordering::Relaxed),
            events_dropped: self.dropped.load(Ordering::Relaxed),
            live_sinks: live,
            failed_sinks: slots.len() - live,
        }
    }

    fn deliver(&self, slots: &[SinkSlot], event: &Event) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        for slot in slots.iter() {
            if slot.live.load(Ordering::Relaxed) {
                self.write_with_retry(slot, event);
            }
        }
    }

    fn write_with_retry(&self, slot: &SinkSlot, event: &Event) {
        let mut attempt = 1;
        loop {
            match slot.sink.write_event(event) {
                Ok(()) => return,
                Err(e)
                    if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock)
                        && attempt < self.max_write_attempts =>
                {
                    attempt += 1;
                }
                Err(e) => {
                    slot.live.store(false, Ordering::Relaxed);
                    warn!(
                        sink = slot.sink.name(),
                        attempts = attempt,
                        error = %e,
                        "trace2 sink failed, disabling it"
                    );
                    return;
                }
            }
        }
    }

    fn flush_slots(slots: &[SinkSlot]) {
        for slot in slots.iter() {
            if !slot.live.load(Ordering::Relaxed) {
                continue;
            }
            if let Err(e) = slot.sink.flush() {
                warn!(sink = slot.sink.name(), error = %e, "trace2 sink flush failed");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("sid", &self.sid)
            .field("opened", &self.is_open())
            .field("closed", &self.is_closed())
            .finish()
    }
}
