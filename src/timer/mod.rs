/*!
 * Timers
 * Named interval timers accumulated per thread and folded into
 * process-wide aggregates
 *
 * Policy for unmatched calls (both reported as anomalies):
 * - start of a running timer closes the open interval, counts it, and
 *   reopens it
 * - stop of an idle timer is ignored
 * - a timer still running when its thread finishes is not counted
 */

use crate::events::Payload;
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Accumulated intervals for one timer id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    pub elapsed: Duration,
    pub count: u64,
    pub min: Duration,
    pub max: Duration,
}

impl TimerStats {
    /// Add one closed interval
    pub fn record(&mut self, interval: Duration) {
        if self.count == 0 {
            self.min = interval;
        } else {
            self.min = self.min.min(interval);
        }
        self.max = self.max.max(interval);
        self.elapsed = self.elapsed.saturating_add(interval);
        self.count += 1;
    }

    /// Fold another thread's stats into these
    pub fn merge(&mut self, other: &TimerStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        self.elapsed = self.elapsed.saturating_add(other.elapsed);
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn thread_payload(&self, id: &str) -> Payload {
        Payload::ThTimer {
            id: id.to_string(),
            elapsed: self.elapsed.as_secs_f64(),
            count: self.count,
            min_elapsed: self.min.as_secs_f64(),
            max_elapsed: self.max.as_secs_f64(),
        }
    }

    pub fn aggregate_payload(&self, id: &str) -> Payload {
        Payload::Timer {
            id: id.to_string(),
            total_elapsed: self.elapsed.as_secs_f64(),
            count: self.count,
            min_elapsed: self.min.as_secs_f64(),
            max_elapsed: self.max.as_secs_f64(),
        }
    }
}

/// Misuse of the start/stop protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAnomaly {
    /// `start` on a timer that is already running
    AlreadyRunning,
    /// `stop` on a timer that is not running
    NotRunning,
    /// Timer still running when its thread finished
    StillRunning,
}

impl TimerAnomaly {
    pub fn describe(self, id: &str) -> String {
        match self {
            TimerAnomaly::AlreadyRunning => {
                format!("timer '{}' started while running; restarted", id)
            }
            TimerAnomaly::NotRunning => format!("timer '{}' stopped while not running", id),
            TimerAnomaly::StillRunning => {
                format!("timer '{}' still running at thread exit; interval dropped", id)
            }
        }
    }
}

#[derive(Debug, Default)]
struct ThreadTimer {
    open_since: Option<Instant>,
    stats: TimerStats,
}

/// Timers owned by a single thread; no synchronization
#[derive(Debug, Default)]
pub struct ThreadTimers {
    timers: HashMap<String, ThreadTimer>,
}

/// What a thread's timers contribute when it finishes
#[derive(Debug, Default)]
pub struct TimerSummary {
    /// Ids whose interval was still open, sorted
    pub still_running: Vec<String>,
    /// Ids with at least one closed interval, sorted
    pub stats: Vec<(String, TimerStats)>,
}

impl ThreadTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn timer_mut(&mut self, id: &str) -> &mut ThreadTimer {
        self.timers.entry(id.to_string()).or_default()
    }

    pub fn start(&mut self, id: &str, now: Instant) -> Option<TimerAnomaly> {
        let timer = self.timer_mut(id);
        let anomaly = timer.open_since.map(|since| {
            timer.stats.record(now.saturating_duration_since(since));
            TimerAnomaly::AlreadyRunning
        });
        timer.open_since = Some(now);
        anomaly
    }

    pub fn stop(&mut self, id: &str, now: Instant) -> Option<TimerAnomaly> {
        let Some(timer) = self.timers.get_mut(id) else {
            return Some(TimerAnomaly::NotRunning);
        };
        match timer.open_since.take() {
            Some(since) => {
                timer.stats.record(now.saturating_duration_since(since));
                None
            }
            None => Some(TimerAnomaly::NotRunning),
        }
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.timers
            .get(id)
            .map(|t| t.open_since.is_some())
            .unwrap_or(false)
    }

    pub fn stats(&self, id: &str) -> Option<TimerStats> {
        self.timers.get(id).map(|t| t.stats)
    }

    /// Close out this thread's timers
    pub fn finish(self) -> TimerSummary {
        let mut summary = TimerSummary::default();
        for (id, timer) in self.timers {
            if timer.open_since.is_some() {
                summary.still_running.push(id.clone());
            }
            if timer.stats.count > 0 {
                summary.stats.push((id, timer.stats));
            }
        }
        summary.still_running.sort();
        summary.stats.sort_by(|a, b| a.0.cmp(&b.0));
        summary
    }
}

/// Process-wide timer totals
///
/// Each fold goes through a DashMap entry, so concurrent folds from
/// different threads never lose an update.
pub struct TimerRegistry {
    totals: DashMap<String, TimerStats, RandomState>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            totals: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn fold(&self, id: &str, stats: &TimerStats) {
        if stats.count == 0 {
            return;
        }
        self.totals
            .entry(id.to_string())
            .and_modify(|total| total.merge(stats))
            .or_insert(*stats);
    }

    pub fn get(&self, id: &str) -> Option<TimerStats> {
        self.totals.get(id).map(|entry| *entry.value())
    }

    /// Totals sorted by id
    pub fn report(&self) -> Vec<(String, TimerStats)> {
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

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
