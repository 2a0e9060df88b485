/*!
 * Counters
 * Named additive counters accumulated per thread and folded into
 * process-wide aggregates
 *
 * Overflow saturates at the i64 bounds and is reported to the caller so it
 * can be recorded as an anomaly.
 */

use crate::events::Payload;
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::HashMap;

/// A sum that hit the i64 bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterOverflow {
    pub id: String,
    pub saturated_at: i64,
}

impl CounterOverflow {
    pub fn describe(&self) -> String {
        format!(
            "counter '{}' overflowed; saturated at {}",
            self.id, self.saturated_at
        )
    }
}

fn saturating_accumulate(total: &mut i64, delta: i64) -> bool {
    match total.checked_add(delta) {
        Some(sum) => {
            *total = sum;
            false
        }
        None => {
            *total = total.saturating_add(delta);
            true
        }
    }
}

/// Counters owned by a single thread; no synchronization
#[derive(Debug, Default)]
pub struct ThreadCounters {
    values: HashMap<String, i64>,
}

impl ThreadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: &str, delta: i64) -> Option<CounterOverflow> {
        let value = self.values.entry(id.to_string()).or_insert(0);
        if saturating_accumulate(value, delta) {
            return Some(CounterOverflow {
                id: id.to_string(),
                saturated_at: *value,
            });
        }
        None
    }

    pub fn value(&self, id: &str) -> Option<i64> {
        self.values.get(id).copied()
    }

    /// Partial sums sorted by id
    pub fn finish(self) -> Vec<(String, i64)> {
        let mut values: Vec<_> = self.values.into_iter().collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values
    }
}

/// Process-wide counter totals
pub struct CounterRegistry {
    totals: DashMap<String, i64, RandomState>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self {
            totals: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Fold one thread's partial sum into the aggregate
    pub fn fold(&self, id: &str, value: i64) -> Option<CounterOverflow> {
        let mut entry = self.totals.entry(id.to_string()).or_insert(0);
        if saturating_accumulate(entry.value_mut(), value) {
            return Some(CounterOverflow {
                id: id.to_string(),
                saturated_at: *entry.value(),
            });
        }
        None
    }

    pub fn get(&self, id: &str) -> Option<i64> {
        self.totals.get(id).map(|entry| *entry.value())
    }

    /// Totals sorted by id
    pub fn report(&self) -> Vec<(String, i64)> {
        let mut totals: Vec<_> = self
            .totals
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        totals.sort_by(|a, b| a.0.cmp(&b.0));
        totals
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn thread_payload(id: &str, value: i64) -> Payload {
    Payload::ThCounter {
        id: id.to_string(),
        value,
    }
}

pub fn aggregate_payload(id: &str, total: i64) -> Payload {
    Payload::Counter {
        id: id.to_string(),
        total,
    }
}
