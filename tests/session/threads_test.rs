/*!
 * Thread Aggregation Tests
 * Worker summaries, fold-in ordering and misuse handling
 */

use crate::support::session;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::time::Duration;
use trace2::{EventKind, Payload, Trace2Error};

#[test]
fn test_two_threads_counter_total() {
    let (trace, memory) = session();

    std::thread::scope(|scope| {
        for (a, b) in [(3, 4), (5, 6)] {
            let trace = &trace;
            scope.spawn(move || {
                trace.thread_start("adder").unwrap();
                trace.counter_add("test/test2", a);
                trace.counter_add("test/test2", b);
                trace.thread_exit();
            });
        }
    });
    trace.finish(0);

    let partials: Vec<i64> = memory
        .of_kind(EventKind::ThCounter)
        .iter()
        .filter_map(|e| match e.payload {
            Payload::ThCounter { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    let mut sorted = partials.clone();
    sorted.sort();
    assert_eq!(sorted, vec![7, 11]);

    let totals = memory.of_kind(EventKind::Counter);
    assert_eq!(totals.len(), 1);
    assert!(matches!(totals[0].payload, Payload::Counter { total: 18, .. }));
}

#[test]
fn test_thread_summaries_precede_aggregates() {
    let (trace, memory) = session();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let trace = &trace;
            scope.spawn(move || {
                trace.thread_start("worker").unwrap();
                for _ in 0..3 {
                    trace.timer_start("test/test2");
                    std::thread::sleep(Duration::from_millis(1));
                    trace.timer_stop("test/test2");
                }
                trace.counter_add("c", 1);
                trace.thread_exit();
            });
        }
    });
    trace.finish(0);

    let kinds = memory.kinds();
    let last_th = kinds
        .iter()
        .rposition(|k| matches!(k, EventKind::ThTimer | EventKind::ThCounter))
        .unwrap();
    let first_aggregate = kinds
        .iter()
        .position(|k| matches!(k, EventKind::Timer | EventKind::Counter))
        .unwrap();
    assert!(last_th < first_aggregate);

    let th_timers = memory.of_kind(EventKind::ThTimer);
    assert_eq!(th_timers.len(), 4);
    let labels: HashSet<_> = th_timers.iter().filter_map(|e| e.thread.clone()).collect();
    assert_eq!(labels.len(), 4);
    assert!(labels.iter().all(|l| l.starts_with("th") && l.ends_with(":worker")));

    let timer = &memory.of_kind(EventKind::Timer)[0];
    match &timer.payload {
        Payload::Timer {
            count,
            total_elapsed,
            min_elapsed,
            max_elapsed,
            ..
        } => {
            assert_eq!(*count, 12);
            assert!(*total_elapsed >= 0.012);
            assert!(min_elapsed <= max_elapsed);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_double_start_is_anomaly() {
    let (trace, memory) = session();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            trace.thread_start("w").unwrap();
            let err = trace.thread_start("w").unwrap_err();
            assert!(matches!(err, Trace2Error::ThreadAlreadyStarted { .. }));
            trace.thread_exit();
        });
    });

    assert_eq!(memory.kinds(), vec![EventKind::Anomaly]);
}

#[test]
fn test_main_cannot_start_again() {
    let (trace, memory) = session();
    assert!(trace.thread_start("again").is_err());
    assert_eq!(memory.kinds(), vec![EventKind::Anomaly]);
}

#[test]
fn test_calls_after_thread_exit_are_anomalies() {
    let (trace, memory) = session();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            trace.thread_start("w").unwrap();
            trace.thread_exit();
            trace.counter_add("c", 1);
            trace.timer_start("t");
        });
    });
    trace.finish(0);

    let anomalies = memory.of_kind(EventKind::Anomaly);
    assert_eq!(anomalies.len(), 2);
    assert!(anomalies
        .iter()
        .all(|e| e.payload.message().unwrap_or("").contains("has exited")));
    assert!(memory.of_kind(EventKind::Counter).is_empty());
}

#[test]
fn test_open_timer_at_thread_exit_is_not_counted() {
    let (trace, memory) = session();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            trace.thread_start("w").unwrap();
            trace.timer_start("closed");
            trace.timer_stop("closed");
            trace.timer_start("dangling");
            trace.thread_exit();
        });
    });
    trace.finish(0);

    assert_eq!(memory.of_kind(EventKind::Anomaly).len(), 1);
    let timers = memory.of_kind(EventKind::Timer);
    assert_eq!(timers.len(), 1);
    assert!(matches!(&timers[0].payload, Payload::Timer { id, count: 1, .. } if id == "closed"));
}

#[test]
fn test_unmatched_stop_and_restart() {
    let (trace, memory) = session();
    trace.timer_stop("t");
    trace.timer_start("t");
    trace.timer_start("t");
    trace.timer_stop("t");
    trace.finish(0);

    assert_eq!(memory.of_kind(EventKind::Anomaly).len(), 2);
    let timer = &memory.of_kind(EventKind::Timer)[0];
    assert!(matches!(timer.payload, Payload::Timer { count: 2, .. }));
}

#[test]
fn test_worker_restart_after_exit() {
    let (trace, _memory) = session();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let first = trace.thread_start("w").unwrap();
            trace.thread_exit();
            let second = trace.thread_start("w").unwrap();
            trace.thread_exit();
            assert_ne!(first, second);
        });
    });
}

#[test]
fn test_unfinished_worker_is_reported_at_finish() {
    let (trace, memory) = session();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            trace.thread_start("w").unwrap();
            trace.timer_start("t");
            trace.counter_add("c", 5);
        });
    });
    trace.finish(0);

    assert_eq!(
        memory.kinds(),
        vec![EventKind::Anomaly, EventKind::Exit, EventKind::Atexit]
    );
    let message = memory.of_kind(EventKind::Anomaly)[0]
        .payload
        .message()
        .unwrap_or("")
        .to_string();
    assert!(message.starts_with("1 thread(s) still registered at exit"));
    assert!(memory.of_kind(EventKind::Counter).is_empty());
}
