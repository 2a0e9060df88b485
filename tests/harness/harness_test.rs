/*!
 * Harness End-to-End Tests
 * Runs the test-trace2 binary and reads back its event stream
 */

use pretty_assertions::assert_eq;
use std::path::Path;
use std::process::Command;
use trace2::bug::UNCHECKED_BUG_MESSAGE;
use trace2::core::limits::{EVENT_TARGET_ENV, NORMAL_TARGET_ENV, PARENT_SID_ENV, PERF_TARGET_ENV};
use trace2::{Event, EventKind, Payload};

const BIN: &str = env!("CARGO_BIN_EXE_test-trace2");

struct Run {
    code: Option<i32>,
    events: Vec<Event>,
}

impl Run {
    fn kinds(&self) -> Vec<EventKind> {
        self.events.iter().map(Event::kind).collect()
    }

    fn of_kind(&self, kind: EventKind) -> Vec<&Event> {
        self.events.iter().filter(|e| e.kind() == kind).collect()
    }

    /// Events written by the outermost process
    fn root_events(&self) -> Vec<&Event> {
        self.events.iter().filter(|e| !e.sid.contains('/')).collect()
    }
}

fn read_events(path: &Path) -> Vec<Event> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn run(args: &[&str]) -> Run {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("events.json");

    let status = Command::new(BIN)
        .args(args)
        .env(EVENT_TARGET_ENV, &target)
        .env_remove(NORMAL_TARGET_ENV)
        .env_remove(PERF_TARGET_ENV)
        .env_remove(PARENT_SID_ENV)
        .env("RUST_LOG", "off")
        .status()
        .unwrap();

    Run {
        code: status.code(),
        events: read_events(&target),
    }
}

fn assert_ends_with_exit(run: &Run, code: i32) {
    let root = run.root_events();
    let n = root.len();
    assert!(n >= 2);
    assert_eq!(root[n - 2].kind(), EventKind::Exit);
    assert_eq!(root[n - 1].kind(), EventKind::Atexit);
    assert_eq!(root[n - 2].payload.exit_code(), Some(code));
    assert_eq!(root[n - 1].payload.exit_code(), Some(code));
}

#[test]
fn test_preamble() {
    let run = run(&["001return", "0"]);
    assert_eq!(run.code, Some(0));
    assert_eq!(
        run.kinds(),
        vec![
            EventKind::Version,
            EventKind::Start,
            EventKind::CmdName,
            EventKind::Exit,
            EventKind::Atexit
        ]
    );
    assert!(matches!(&run.events[2].payload, Payload::CmdName { name } if name == "trace2"));
}

#[test]
fn test_return_code() {
    let run = run(&["001return", "7"]);
    assert_eq!(run.code, Some(7));
    assert_ends_with_exit(&run, 7);
}

#[test]
fn test_return_code_wraps_like_the_os() {
    let run = run(&["001return", "256"]);
    assert_eq!(run.code, Some(0));
    assert_ends_with_exit(&run, 0);
}

#[test]
fn test_failed_child_exit_code_matches_stream() {
    let run = run(&["004child", "/definitely/not/a/program"]);
    assert_eq!(run.code, Some(255));
    assert_ends_with_exit(&run, 255);

    let exits = run.of_kind(EventKind::ChildExit);
    assert_eq!(exits.len(), 1);
    assert!(matches!(exits[0].payload, Payload::ChildExit { code: -1, .. }));
    assert_eq!(run.of_kind(EventKind::Error).len(), 1);
}

#[test]
fn test_explicit_exit() {
    let run = run(&["002exit", "3"]);
    assert_eq!(run.code, Some(3));
    assert_ends_with_exit(&run, 3);
}

#[test]
fn test_error_messages_in_order() {
    let run = run(&["003error", "a", "b", "c"]);
    assert_eq!(run.code, Some(0));

    let messages: Vec<_> = run
        .of_kind(EventKind::Error)
        .iter()
        .filter_map(|e| e.payload.message())
        .collect();
    assert_eq!(messages, vec!["a", "b", "c"]);
}

#[test]
fn test_empty_child_command_line() {
    let run = run(&["004child"]);
    assert_eq!(run.code, Some(0));
    assert!(run.of_kind(EventKind::ChildStart).is_empty());
    assert!(run.of_kind(EventKind::ChildExit).is_empty());
}

#[test]
fn test_nested_child_propagates_code_and_sid() {
    let run = run(&["004child", BIN, "001return", "5"]);
    assert_eq!(run.code, Some(5));
    assert_ends_with_exit(&run, 5);

    let root_sid = run.root_events()[0].sid.clone();
    let child_start = run.of_kind(EventKind::ChildStart);
    assert_eq!(child_start.len(), 1);
    let child_sid = match &child_start[0].payload {
        Payload::ChildStart { child_sid, .. } => child_sid.clone(),
        other => panic!("unexpected payload {:?}", other),
    };
    assert!(child_sid.starts_with(&format!("{}/", root_sid)));

    let child_events: Vec<_> = run.events.iter().filter(|e| e.sid == child_sid).collect();
    assert_eq!(child_events.first().map(|e| e.kind()), Some(EventKind::Version));
    assert_eq!(child_events.last().map(|e| e.kind()), Some(EventKind::Atexit));

    let child_exit = run.of_kind(EventKind::ChildExit);
    assert!(matches!(child_exit[0].payload, Payload::ChildExit { code: 5, .. }));
}

#[test]
fn test_data_events() {
    let run = run(&["006data", "cat", "k1", "v1", "cat", "k2", "v2"]);
    assert_eq!(run.code, Some(0));
    assert_eq!(run.of_kind(EventKind::Data).len(), 2);
}

#[test]
fn test_bad_arguments_die() {
    let run = run(&["006data", "only-two", "args"]);
    assert_eq!(run.code, Some(128));
    assert_eq!(run.of_kind(EventKind::Error).len(), 1);
    assert_ends_with_exit(&run, 128);
}

#[test]
fn test_unknown_unit_prints_usage() {
    let run = run(&["999nope"]);
    assert_eq!(run.code, Some(129));
    assert_ends_with_exit(&run, 129);
}

#[test]
fn test_fatal_bug() {
    let run = run(&["007bug"]);
    assert_eq!(run.code, Some(99));
    assert_eq!(run.of_kind(EventKind::Bug).len(), 1);
    assert_ends_with_exit(&run, 99);
}

#[test]
fn test_bug_checkpoint() {
    let run = run(&["008bug"]);
    assert_eq!(run.code, Some(99));
    assert_eq!(run.of_kind(EventKind::Bug).len(), 3);
}

#[test]
fn test_unchecked_bugs_caught_at_exit() {
    let run = run(&["009bug_BUG"]);
    assert_eq!(run.code, Some(99));

    let bugs = run.of_kind(EventKind::Bug);
    assert_eq!(bugs.len(), 3);
    assert_eq!(bugs[2].payload.message(), Some(UNCHECKED_BUG_MESSAGE));
}

#[test]
fn test_bug_then_fatal() {
    let run = run(&["010bug_BUG"]);
    assert_eq!(run.code, Some(99));
    assert_eq!(run.of_kind(EventKind::Bug).len(), 2);
}

#[test]
fn test_single_thread_timer() {
    let run = run(&["100timer", "5", "10"]);
    assert_eq!(run.code, Some(0));

    let timers = run.of_kind(EventKind::Timer);
    assert_eq!(timers.len(), 1);
    match &timers[0].payload {
        Payload::Timer {
            id,
            count,
            total_elapsed,
            ..
        } => {
            assert_eq!(id, "test/test1");
            assert_eq!(*count, 5);
            assert!(*total_elapsed >= 0.050);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_multi_thread_timer() {
    let run = run(&["101timer", "3", "1", "4"]);
    assert_eq!(run.code, Some(0));
    assert_eq!(run.of_kind(EventKind::ThTimer).len(), 4);
    assert!(matches!(
        run.of_kind(EventKind::Timer)[0].payload,
        Payload::Timer { count: 12, .. }
    ));
}

#[test]
fn test_single_thread_counter() {
    let run = run(&["200counter", "1", "2", "3"]);
    assert_eq!(run.code, Some(0));
    assert!(matches!(
        run.of_kind(EventKind::Counter)[0].payload,
        Payload::Counter { total: 6, .. }
    ));
}

#[test]
fn test_multi_thread_counter() {
    let run = run(&["201counter", "3", "4", "2"]);
    assert_eq!(run.code, Some(0));
    assert_eq!(run.of_kind(EventKind::ThCounter).len(), 2);
    assert!(matches!(
        run.of_kind(EventKind::Counter)[0].payload,
        Payload::Counter { total: 14, .. }
    ));
}

#[cfg(unix)]
#[test]
fn test_exec_replaces_process() {
    let run = run(&["005exec", BIN, "001return", "6"]);
    assert_eq!(run.code, Some(6));

    let execs = run.of_kind(EventKind::Exec);
    assert_eq!(execs.len(), 1);
    assert!(run.of_kind(EventKind::ExecResult).is_empty());

    let replaced: Vec<_> = run.events.iter().filter(|e| e.sid.contains('/')).collect();
    assert_eq!(replaced.last().map(|e| e.kind()), Some(EventKind::Atexit));
}
