/*!
 * Memory Sink
 * Shared in-memory capture of every delivered event
 */

use super::Sink;
use crate::events::{Event, EventKind};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// In-memory sink; clones share the same buffer
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything captured so far, in delivery order
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Kinds in delivery order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(Event::kind).collect()
    }

    /// Captured events of one kind, in delivery order
    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write_event(&self, event: &Event) -> io::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}
