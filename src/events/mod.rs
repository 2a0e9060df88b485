/*!
 * Event Schema
 * Strongly-typed trace2 events as written to every sink
 */

mod clock;

pub use clock::Clock;

use crate::core::types::{ChildId, ExecId, ExitCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Discriminant of an [`Event`], also used for filtering captured streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Version,
    Start,
    CmdName,
    DefParam,
    Data,
    ChildStart,
    ChildExit,
    Exec,
    ExecResult,
    Error,
    Bug,
    Anomaly,
    Timer,
    ThTimer,
    Counter,
    ThCounter,
    Exit,
    Atexit,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Version => "version",
            EventKind::Start => "start",
            EventKind::CmdName => "cmd_name",
            EventKind::DefParam => "def_param",
            EventKind::Data => "data",
            EventKind::ChildStart => "child_start",
            EventKind::ChildExit => "child_exit",
            EventKind::Exec => "exec",
            EventKind::ExecResult => "exec_result",
            EventKind::Error => "error",
            EventKind::Bug => "bug",
            EventKind::Anomaly => "anomaly",
            EventKind::Timer => "timer",
            EventKind::ThTimer => "th_timer",
            EventKind::Counter => "counter",
            EventKind::ThCounter => "th_counter",
            EventKind::Exit => "exit",
            EventKind::Atexit => "atexit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific event body
///
/// Durations are reported in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Payload {
    Version {
        evt: String,
        exe: String,
    },
    Start {
        argv: Vec<String>,
    },
    CmdName {
        name: String,
    },
    DefParam {
        key: String,
        value: String,
    },
    Data {
        category: String,
        key: String,
        value: String,
    },
    ChildStart {
        child_id: ChildId,
        child_sid: String,
        argv: Vec<String>,
    },
    ChildExit {
        child_id: ChildId,
        child_sid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
        code: ExitCode,
        elapsed: f64,
    },
    Exec {
        exec_id: ExecId,
        argv: Vec<String>,
    },
    ExecResult {
        exec_id: ExecId,
        code: ExitCode,
    },
    Error {
        message: String,
    },
    Bug {
        message: String,
    },
    Anomaly {
        message: String,
    },
    Timer {
        id: String,
        total_elapsed: f64,
        count: u64,
        min_elapsed: f64,
        max_elapsed: f64,
    },
    ThTimer {
        id: String,
        elapsed: f64,
        count: u64,
        min_elapsed: f64,
        max_elapsed: f64,
    },
    Counter {
        id: String,
        total: i64,
    },
    ThCounter {
        id: String,
        value: i64,
    },
    Exit {
        code: ExitCode,
        elapsed: f64,
    },
    Atexit {
        code: ExitCode,
        elapsed: f64,
    },
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::Version { .. } => EventKind::Version,
            Payload::Start { .. } => EventKind::Start,
            Payload::CmdName { .. } => EventKind::CmdName,
            Payload::DefParam { .. } => EventKind::DefParam,
            Payload::Data { .. } => EventKind::Data,
            Payload::ChildStart { .. } => EventKind::ChildStart,
            Payload::ChildExit { .. } => EventKind::ChildExit,
            Payload::Exec { .. } => EventKind::Exec,
            Payload::ExecResult { .. } => EventKind::ExecResult,
            Payload::Error { .. } => EventKind::Error,
            Payload::Bug { .. } => EventKind::Bug,
            Payload::Anomaly { .. } => EventKind::Anomaly,
            Payload::Timer { .. } => EventKind::Timer,
            Payload::ThTimer { .. } => EventKind::ThTimer,
            Payload::Counter { .. } => EventKind::Counter,
            Payload::ThCounter { .. } => EventKind::ThCounter,
            Payload::Exit { .. } => EventKind::Exit,
            Payload::Atexit { .. } => EventKind::Atexit,
        }
    }

    /// Exit code carried by `exit`/`atexit`
    pub fn exit_code(&self) -> Option<ExitCode> {
        match self {
            Payload::Exit { code, .. } | Payload::Atexit { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Message carried by `error`/`bug`/`anomaly`
    pub fn message(&self) -> Option<&str> {
        match self {
            Payload::Error { message } | Payload::Bug { message } | Payload::Anomaly { message } => {
                Some(message)
            }
            _ => None,
        }
    }
}

/// One emitted record; immutable once constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub payload: Payload,
    pub sid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub t_rel: f64,
}

impl Event {
    /// Stamp a payload with identity and time
    #[inline]
    pub fn new(sid: &str, thread: Option<&str>, clock: &Clock, payload: Payload) -> Self {
        let (time, t_rel) = clock.now();
        Self {
            payload,
            sid: sid.to_string(),
            thread: thread.map(str::to_string),
            time,
            t_rel,
        }
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
