/*!
 * Sink Formats
 * Line rendering for the event, normal and perf outputs
 */

use crate::events::{Event, Payload};
use std::fmt::Write as _;
use std::io;
use time::macros::format_description;

/// Output format of a writer sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFormat {
    /// One JSON object per line
    Event,
    /// Human-readable one-liners
    Normal,
    /// Pipe-separated columns with nesting depth and relative time
    Perf,
}

impl SinkFormat {
    pub const fn name(self) -> &'static str {
        match self {
            SinkFormat::Event => "event",
            SinkFormat::Normal => "normal",
            SinkFormat::Perf => "perf",
        }
    }

    /// File extension used for per-process files in directory targets
    pub const fn file_suffix(self) -> &'static str {
        match self {
            SinkFormat::Event => "json",
            SinkFormat::Normal => "log",
            SinkFormat::Perf => "perf",
        }
    }

    /// Render one event as a newline-terminated line
    pub fn render(self, event: &Event) -> io::Result<String> {
        match self {
            SinkFormat::Event => {
                let mut line = serde_json::to_string(event)?;
                line.push('\n');
                Ok(line)
            }
            SinkFormat::Normal => Ok(format!(
                "{} {:<12} {}\n",
                clock_time(event),
                event.kind().as_str(),
                detail(&event.payload)
            )),
            SinkFormat::Perf => {
                let depth = event.sid.split('/').count().saturating_sub(1);
                Ok(format!(
                    "{} | d{} | {:<24} | {:<12} | {:>12.6} | {}\n",
                    clock_time(event),
                    depth,
                    event.thread.as_deref().unwrap_or("-"),
                    event.kind().as_str(),
                    event.t_rel,
                    detail(&event.payload)
                ))
            }
        }
    }
}

fn clock_time(event: &Event) -> String {
    let format = format_description!("[hour]:[minute]:[second].[subsecond digits:6]");
    event
        .time
        .format(&format)
        .unwrap_or_else(|_| String::from("??:??:??.??????"))
}

fn quote_argv(argv: &[String]) -> String {
    let mut out = String::new();
    for (idx, arg) in argv.iter().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        if arg.is_empty() || arg.chars().any(char::is_whitespace) {
            let _ = write!(out, "'{}'", arg);
        } else {
            out.push_str(arg);
        }
    }
    out
}

/// Kind-specific text used by the normal and perf formats
pub fn detail(payload: &Payload) -> String {
    match payload {
        Payload::Version { evt, exe } => format!("evt:{} exe:{}", evt, exe),
        Payload::Start { argv } => quote_argv(argv),
        Payload::CmdName { name } => name.clone(),
        Payload::DefParam { key, value } => format!("{}={}", key, value),
        Payload::Data {
            category,
            key,
            value,
        } => format!("{}:{}={}", category, key, value),
        Payload::ChildStart { child_id, argv, .. } => {
            format!("[ch{}] {}", child_id, quote_argv(argv))
        }
        Payload::ChildExit {
            child_id,
            pid,
            code,
            elapsed,
            ..
        } => match pid {
            Some(pid) => format!(
                "[ch{}] pid:{} code:{} elapsed:{:.6}",
                child_id, pid, code, elapsed
            ),
            None => format!("[ch{}] code:{} elapsed:{:.6}", child_id, code, elapsed),
        },
        Payload::Exec { exec_id, argv } => format!("[exec{}] {}", exec_id, quote_argv(argv)),
        Payload::ExecResult { exec_id, code } => format!("[exec{}] code:{}", exec_id, code),
        Payload::Error { message } | Payload::Bug { message } | Payload::Anomaly { message } => {
            message.clone()
        }
        Payload::Timer {
            id,
            total_elapsed,
            count,
            min_elapsed,
            max_elapsed,
        } => format!(
            "{} count:{} total:{:.6} min:{:.6} max:{:.6}",
            id, count, total_elapsed, min_elapsed, max_elapsed
        ),
        Payload::ThTimer {
            id,
            elapsed,
            count,
            min_elapsed,
            max_elapsed,
        } => format!(
            "{} count:{} total:{:.6} min:{:.6} max:{:.6}",
            id, count, elapsed, min_elapsed, max_elapsed
        ),
        Payload::Counter { id, total } => format!("{} total:{}", id, total),
        Payload::ThCounter { id, value } => format!("{} value:{}", id, value),
        Payload::Exit { code, elapsed } | Payload::Atexit { code, elapsed } => {
            format!("elapsed:{:.6} code:{}", elapsed, code)
        }
    }
}
