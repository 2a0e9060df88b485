/*!
 * Sinks
 * Append-only destinations for emitted events
 */

mod format;
mod memory;
mod writer;

pub use format::{detail, SinkFormat};
pub use memory::MemorySink;
pub use writer::WriterSink;

use crate::config::{Target, Trace2Config};
use crate::core::errors::Trace2Error;
use crate::core::types::Trace2Result;
use crate::events::Event;
use crate::identity::SessionId;
use std::fs::OpenOptions;
use std::io;
use tracing::warn;

/// Destination for emitted events
///
/// # Implementation requirements
/// - Never panic; report failures through `io::Result`.
/// - `Interrupted` and `WouldBlock` are retried with the same event, so
///   return them only when nothing of the event was written.
pub trait Sink: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    /// Write one event
    fn write_event(&self, event: &Event) -> io::Result<()>;

    /// Push buffered output to its destination
    fn flush(&self) -> io::Result<()>;
}

/// Open a writer sink for a configured target
pub fn open_target(
    target: &Target,
    format: SinkFormat,
    sid: &SessionId,
) -> Trace2Result<Box<dyn Sink>> {
    let path = match target {
        Target::Stderr => {
            return Ok(Box::new(WriterSink::new(
                format!("{}:stderr", format.name()),
                format,
                io::stderr(),
            )));
        }
        Target::File(path) => path.clone(),
        Target::Directory(dir) => {
            dir.join(format!("{}.{}", sid.last_segment(), format.file_suffix()))
        }
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| Trace2Error::SinkOpen {
            path: path.clone(),
            source,
        })?;

    Ok(Box::new(WriterSink::new(
        format!("{}:{}", format.name(), path.display()),
        format,
        file,
    )))
}

/// Open every target named by a configuration
///
/// Targets that cannot be opened are skipped with a warning; instrumentation
/// must never keep the instrumented program from running.
pub fn open_configured(config: &Trace2Config, sid: &SessionId) -> Vec<Box<dyn Sink>> {
    let targets = [
        (config.event.as_ref(), SinkFormat::Event),
        (config.normal.as_ref(), SinkFormat::Normal),
        (config.perf.as_ref(), SinkFormat::Perf),
    ];

    let mut sinks = Vec::new();
    for (target, format) in targets {
        let Some(target) = target else { continue };
        match open_target(target, format, sid) {
            Ok(sink) => sinks.push(sink),
            Err(e) => warn!(format = format.name(), error = %e, "trace2 sink unavailable"),
        }
    }
    sinks
}
