/*!
 * test-trace2
 * Drives the trace2 engine through named unit scenarios
 *
 * Usage: test-trace2 <unit> [<args>...]
 * Sinks are selected with TRACE2_EVENT, TRACE2_NORMAL and TRACE2_PERF.
 */

mod units;

use std::sync::Arc;
use trace2::{init_tracing, ExitGuard, Trace2, Trace2Config};

fn main() {
    init_tracing();

    let trace = Trace2::initialize(Trace2Config::from_env());
    trace.install_panic_hook();
    let guard = ExitGuard::new(Arc::clone(&trace));

    let argv: Vec<String> = std::env::args().collect();
    trace.cmd_start(argv.iter().cloned());
    trace.cmd_name("trace2");

    let args = argv.get(1..).unwrap_or(&[]);
    let code = units::dispatch(&trace, args);
    guard.complete(code)
}
