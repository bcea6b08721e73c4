//! Poll interval schedule
//!
//! Exponential backoff with a cap. Early polls are frequent so fast jobs
//! are picked up cheaply; long jobs settle at the cap.

use std::time::Duration;

/// First delay between status polls
pub const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(1_500);

/// Lower bound for any delay; a zero interval would never grow
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound for the delay between status polls
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(5_000);

/// Growth factor applied after every poll
pub const BACKOFF_FACTOR: f64 = 1.4;

/// How long a client waits before giving up.
///
/// Kept under the executor's own upstream ceiling.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(14 * 60);

/// `min(cap, current * factor)`, rounded to whole milliseconds
pub fn next_interval(current: Duration, factor: f64, cap: Duration) -> Duration {
    let grown = (current.as_millis() as f64 * factor).round();
    let cap_ms = cap.as_millis() as f64;

    Duration::from_millis(grown.min(cap_ms).max(0.0) as u64)
}

/// Iterator over successive poll delays
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    factor: f64,
    cap: Duration,
}

impl Backoff {
    /// `initial` and `cap` are raised to at least `MIN_POLL_INTERVAL`
    pub fn new(initial: Duration, factor: f64, cap: Duration) -> Self {
        let cap = cap.max(MIN_POLL_INTERVAL);
        Self {
            current: initial.clamp(MIN_POLL_INTERVAL, cap),
            factor,
            cap,
        }
    }

    /// Returns the delay to wait now and advances the schedule
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = next_interval(self.current, self.factor, self.cap).max(MIN_POLL_INTERVAL);
        delay
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_POLL_INTERVAL, BACKOFF_FACTOR, MAX_POLL_INTERVAL)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
