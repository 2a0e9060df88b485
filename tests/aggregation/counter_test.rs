/*!
 * Counter Aggregation Properties
 * Totals are exact regardless of thread interleaving
 */

use proptest::prelude::*;
use trace2::counter::{CounterRegistry, ThreadCounters};
use trace2::{EventKind, MemorySink, Payload, Trace2};

fn run_threads(per_thread: &[Vec<i32>]) -> (i64, Vec<i64>) {
    let memory = MemorySink::new();
    let trace = Trace2::builder()
        .with_parent_sid(None)
        .with_sink(Box::new(memory.clone()))
        .build();

    std::thread::scope(|scope| {
        for values in per_thread {
            let trace = &trace;
            scope.spawn(move || {
                trace.thread_start("adder").unwrap();
                for &v in values {
                    trace.counter_add("sum", i64::from(v));
                }
                trace.thread_exit();
            });
        }
    });
    trace.finish(0);

    let total = memory
        .of_kind(EventKind::Counter)
        .iter()
        .find_map(|e| match e.payload {
            Payload::Counter { total, .. } => Some(total),
            _ => None,
        })
        .unwrap_or(0);
    let partials = memory
        .of_kind(EventKind::ThCounter)
        .iter()
        .filter_map(|e| match e.payload {
            Payload::ThCounter { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    (total, partials)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_aggregate_is_exact_sum(
        per_thread in prop::collection::vec(prop::collection::vec(any::<i32>(), 1..20), 1..6)
    ) {
        let expected: i64 = per_thread.iter().flatten().map(|&v| i64::from(v)).sum();
        let (total, partials) = run_threads(&per_thread);

        prop_assert_eq!(total, expected);
        prop_assert_eq!(partials.len(), per_thread.len());
        prop_assert_eq!(partials.iter().sum::<i64>(), expected);
    }

    #[test]
    fn prop_fold_order_does_not_matter(values in prop::collection::vec(-1_000_000i64..1_000_000, 1..50)) {
        let forward = CounterRegistry::new();
        let backward = CounterRegistry::new();
        for &v in &values {
            forward.fold("c", v);
        }
        for &v in values.iter().rev() {
            backward.fold("c", v);
        }
        prop_assert_eq!(forward.get("c"), backward.get("c"));
        prop_assert_eq!(forward.get("c"), Some(values.iter().sum::<i64>()));
    }
}

#[test]
fn test_saturation_reports_anomaly() {
    let memory = MemorySink::new();
    let trace = Trace2::builder()
        .with_parent_sid(None)
        .with_sink(Box::new(memory.clone()))
        .build();

    trace.counter_add("big", i64::MAX);
    trace.counter_add("big", 1);
    trace.finish(0);

    assert_eq!(memory.of_kind(EventKind::Anomaly).len(), 1);
    let total = &memory.of_kind(EventKind::Counter)[0];
    assert!(matches!(total.payload, Payload::Counter { total: i64::MAX, .. }));
}

#[test]
fn test_thread_counters_sorted_finish() {
    let mut counters = ThreadCounters::new();
    counters.add("z", 1);
    counters.add("a", 2);
    let ids: Vec<_> = counters.finish().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["a", "z"]);
}
