/*!
 * Trace2 Library
 * Hierarchical process/thread event instrumentation
 */

pub mod bug;
pub mod bus;
pub mod child;
pub mod config;
pub mod core;
pub mod counter;
pub mod diagnostics;
pub mod events;
pub mod identity;
pub mod session;
pub mod thread;
pub mod timer;

// Re-exports
pub use bus::sinks::{MemorySink, Sink, SinkFormat, WriterSink};
pub use bus::{BusStats, EventBus};
pub use child::ChildHandle;
pub use config::{Target, Trace2Config};
pub use crate::core::errors::Trace2Error;
pub use crate::core::types::{ExitCode, ExitHandler, Trace2Result};
pub use diagnostics::init_tracing;
pub use events::{Event, EventKind, Payload};
pub use identity::{SessionId, SidAllocator};
pub use session::{ExitGuard, Trace2, Trace2Builder};
pub use timer::TimerStats;
