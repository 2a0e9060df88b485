/*!
 * Writer Sink
 * Formats events onto any `Write` destination
 */

use super::format::SinkFormat;
use super::Sink;
use crate::events::Event;
use parking_lot::Mutex;
use std::io::{self, ErrorKind, Write};

/// Sink that renders each event as one line on a writer
///
/// The whole line is written under the lock, so concurrent emitters never
/// interleave partial records.
pub struct WriterSink<W: Write + Send> {
    name: String,
    format: SinkFormat,
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(name: impl Into<String>, format: SinkFormat, writer: W) -> Self {
        Self {
            name: name.into(),
            format,
            writer: Mutex::new(writer),
        }
    }

    pub fn format(&self) -> SinkFormat {
        self.format
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_event(&self, event: &Event) -> io::Result<()> {
        let line = self.format.render(event)?;
        let mut bytes = line.as_bytes();
        let mut writer = self.writer.lock();
        let mut torn = false;
        while !bytes.is_empty() {
            match writer.write(bytes) {
                Ok(0) => return Err(ErrorKind::WriteZero.into()),
                Ok(n) => {
                    bytes = &bytes[n..];
                    torn = true;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                // A resend would duplicate the part already written
                Err(e) if torn => return Err(io::Error::new(ErrorKind::Other, e)),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}
