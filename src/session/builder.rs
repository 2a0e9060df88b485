/*!
 * Trace2 Builder
 * Builder pattern for Trace2 session construction
 */

use super::Trace2;
use crate::bug::BugReporter;
use crate::bus::sinks::{self, Sink};
use crate::bus::EventBus;
use crate::child::ChildProcessTracker;
use crate::config::Trace2Config;
use crate::core::limits::PARENT_SID_ENV;
use crate::core::types::ExitHandler;
use crate::counter::CounterRegistry;
use crate::events::Clock;
use crate::identity::SidAllocator;
use crate::thread::ThreadRegistry;
use crate::timer::TimerRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Builder for [`Trace2`]
pub struct Trace2Builder {
    config: Trace2Config,
    extra_sinks: Vec<Box<dyn Sink>>,
    parent_sid: Option<String>,
    exit_handler: ExitHandler,
}

impl Trace2Builder {
    /// Disabled targets, parent SID read from the environment,
    /// `std::process::exit` as the exit handler
    pub fn new() -> Self {
        Self {
            config: Trace2Config::default(),
            extra_sinks: Vec::new(),
            parent_sid: std::env::var(PARENT_SID_ENV).ok(),
            exit_handler: std::process::exit,
        }
    }

    pub fn with_config(mut self, config: Trace2Config) -> Self {
        self.config = config;
        self
    }

    /// Add a sink alongside the configured targets
    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.extra_sinks.push(sink);
        self
    }

    /// Override the inherited SID; `None` mints a fresh root
    pub fn with_parent_sid(mut self, raw: Option<&str>) -> Self {
        self.parent_sid = raw.map(str::to_string);
        self
    }

    /// Replace the function that terminates the process
    pub fn with_exit_handler(mut self, handler: ExitHandler) -> Self {
        self.exit_handler = handler;
        self
    }

    /// Open the sinks and register the calling thread as `main`
    pub fn build(self) -> Arc<Trace2> {
        let allocator = SidAllocator::new();
        let sid = allocator.resolve(self.parent_sid.as_deref());

        let bus = EventBus::new(&sid, Clock::new(), self.config.max_write_attempts);
        let mut opened = sinks::open_configured(&self.config, &sid);
        opened.extend(self.extra_sinks);
        let sink_count = opened.len();
        bus.open(opened);

        let threads = ThreadRegistry::new();
        threads.register_main();

        info!(sid = %sid, depth = sid.depth(), sinks = sink_count, "trace2 session started");

        Arc::new(Trace2 {
            sid,
            config: self.config,
            bus,
            allocator,
            threads,
            timers: TimerRegistry::new(),
            counters: CounterRegistry::new(),
            children: ChildProcessTracker::new(),
            bugs: BugReporter::new(),
            finished: Mutex::new(None),
            exit_handler: self.exit_handler,
        })
    }
}

impl Default for Trace2Builder {
    fn default() -> Self {
        Self::new()
    }
}
