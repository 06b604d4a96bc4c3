//! Retry gate for the elevation service.
//!
//! After a failed request the provider fails fast until the gate opens
//! again. Each consecutive failure doubles the wait up to a ceiling; a
//! success closes the streak. Runs on the tokio clock so paused-time tests
//! can step through it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Largest extra share added on top of a wait, so that several viewers
/// hitting the same outage don't retry in lockstep.
const SPREAD: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct Backoff {
    first_wait: Duration,
    ceiling: Duration,
    next_wait: Duration,
    closed_until: Option<Instant>,
}

impl Backoff {
    pub fn new(first_wait: Duration, ceiling: Duration) -> Self {
        let first_wait = first_wait.max(Duration::from_millis(1));
        Self {
            first_wait,
            ceiling: ceiling.max(first_wait),
            next_wait: first_wait,
            closed_until: None,
        }
    }

    /// Time left until requests may go out again, `None` when they may now.
    pub fn retry_in(&self) -> Option<Duration> {
        let until = self.closed_until?;
        let left = until.saturating_duration_since(Instant::now());
        (!left.is_zero()).then_some(left)
    }

    /// Close the gate after a failure. Returns how long it stays closed.
    pub fn record_failure(&mut self) -> Duration {
        let wait = spread(self.next_wait);
        self.closed_until = Some(Instant::now() + wait);
        self.next_wait = self.next_wait.saturating_mul(2).min(self.ceiling);
        wait
    }

    pub fn record_success(&mut self) {
        self.next_wait = self.first_wait;
        self.closed_until = None;
    }
}

fn spread(wait: Duration) -> Duration {
    let fraction = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since| f64::from(since.subsec_nanos()) / 1e9)
        .unwrap_or(0.0);
    wait.mul_f64(1.0 + SPREAD * fraction)
}
