/*!
 * Session Clock
 * Absolute and start-relative timestamps from one monotonic origin
 */

use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Timestamp source for one session
///
/// Absolute times are derived from the wall clock sampled once at start plus
/// monotonic elapsed time, so `t_abs` never runs backwards within a session.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
    start_wall: OffsetDateTime,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            start_wall: OffsetDateTime::now_utc(),
        }
    }

    #[inline]
    pub fn start_wall(&self) -> OffsetDateTime {
        self.start_wall
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Absolute time and seconds since start, sampled together
    #[inline]
    pub fn now(&self) -> (OffsetDateTime, f64) {
        let elapsed = self.elapsed();
        (self.start_wall + elapsed, elapsed.as_secs_f64())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
