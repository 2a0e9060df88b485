/*!
 * Exit Guard
 * Scoped finalization so every termination path closes the event stream
 */

use super::Trace2;
use crate::core::limits::PANIC_EXIT_CODE;
use crate::core::types::ExitCode;
use std::sync::{Arc, Weak};

/// Finishes the session when it goes out of scope
///
/// Hold one for the lifetime of `main`. If the scope unwinds the session
/// finishes with the panic exit code; a plain drop finishes with 0.
#[must_use = "dropping the guard finishes the session immediately"]
pub struct ExitGuard {
    trace: Arc<Trace2>,
}

impl ExitGuard {
    pub fn new(trace: Arc<Trace2>) -> Self {
        Self { trace }
    }

    pub fn session(&self) -> &Arc<Trace2> {
        &self.trace
    }

    /// Finish with `code` and terminate through the session's exit handler
    pub fn complete(self, code: ExitCode) -> ! {
        self.trace.exit(code)
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let code = if std::thread::panicking() {
            PANIC_EXIT_CODE
        } else {
            0
        };
        self.trace.finish(code);
    }
}

pub(super) fn install_panic_hook(session: Weak<Trace2>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(trace) = session.upgrade() {
            let payload = info.payload();
            let what = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "Box<dyn Any>".to_string());
            let message = match info.location() {
                Some(location) => format!(
                    "panic at {}:{}: {}",
                    location.file(),
                    location.line(),
                    what
                ),
                None => format!("panic: {}", what),
            };
            trace.error(&message);
        }
        previous(info);
    }));
}
