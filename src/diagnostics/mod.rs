/*!
 * Diagnostics
 * Crate-internal structured logging; never written to trace2 sinks
 */

mod tracer;

pub use tracer::{init_tracing, json_requested, unit_span};
