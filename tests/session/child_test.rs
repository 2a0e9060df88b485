/*!
 * Child Process Tests
 */

use crate::support::session;
use pretty_assertions::assert_eq;
use trace2::core::limits::PARENT_SID_ENV;
use trace2::{EventKind, Payload, SessionId, Trace2Error};

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[test]
fn test_empty_command_line_records_nothing() {
    let (trace, memory) = session();

    let err = trace.run_child(&[]).unwrap_err();
    assert!(matches!(err, Trace2Error::EmptyCommandLine));
    assert!(memory.is_empty());
    assert_eq!(trace.finish(0), 0);
}

#[test]
fn test_wait_on_registered_child_is_rejected() {
    let (trace, memory) = session();

    let handle = trace.register_child(&argv(&["prog"])).unwrap();
    let child_id = handle.child_id();
    let err = trace.wait_child(handle).unwrap_err();
    assert!(matches!(err, Trace2Error::NotLaunched { child_id: id } if id == child_id));

    assert_eq!(memory.kinds(), vec![EventKind::ChildStart]);
}

#[test]
fn test_registered_child_gets_derived_sid() {
    let (trace, memory) = session();

    let handle = trace.register_child(&argv(&["external", "--flag"])).unwrap();
    let (key, value) = handle.env();
    assert_eq!(key, PARENT_SID_ENV);

    let child: SessionId = value.parse().unwrap();
    assert_eq!(child.depth(), trace.sid().depth() + 1);
    assert!(trace.sid().is_parent_of(&child));

    trace.complete_child(handle, 2);
    assert_eq!(
        memory.kinds(),
        vec![EventKind::ChildStart, EventKind::ChildExit]
    );
}

#[test]
fn test_child_ids_and_sids_are_distinct() {
    let (trace, memory) = session();

    for _ in 0..5 {
        let handle = trace.register_child(&argv(&["x"])).unwrap();
        trace.complete_child(handle, 0);
    }

    let starts = memory.of_kind(EventKind::ChildStart);
    let mut ids = Vec::new();
    let mut sids = Vec::new();
    for event in &starts {
        if let Payload::ChildStart {
            child_id, child_sid, ..
        } = &event.payload
        {
            ids.push(*child_id);
            sids.push(child_sid.clone());
        }
    }
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    sids.sort();
    sids.dedup();
    assert_eq!(sids.len(), 5);
}

#[cfg(unix)]
#[test]
fn test_run_child_propagates_exit_code() {
    let (trace, memory) = session();

    assert_eq!(trace.run_child(&argv(&["sh", "-c", "exit 4"])).unwrap(), 4);
    assert_eq!(trace.run_child(&argv(&["true"])).unwrap(), 0);

    let exits = memory.of_kind(EventKind::ChildExit);
    assert_eq!(exits.len(), 2);
    assert!(matches!(exits[0].payload, Payload::ChildExit { code: 4, pid: Some(_), .. }));
}

#[cfg(unix)]
#[test]
fn test_signal_death_maps_to_128_plus_signal() {
    let (trace, _memory) = session();
    let code = trace
        .run_child(&argv(&["sh", "-c", "kill -9 $$"]))
        .unwrap();
    assert_eq!(code, 128 + 9);
}

#[test]
fn test_spawn_failure_surfaces_error() {
    let (trace, memory) = session();

    let err = trace
        .run_child(&argv(&["/nonexistent/trace2/child"]))
        .unwrap_err();
    assert!(matches!(err, Trace2Error::SpawnFailed { .. }));
    assert_eq!(
        memory.kinds(),
        vec![EventKind::ChildStart, EventKind::ChildExit]
    );
}
