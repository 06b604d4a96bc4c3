//! Frame scheduling for the flight loop.
//!
//! The controller awaits [`FrameSource::next_frame`] inside a `select!`, so
//! a pending frame is cancelled simply by dropping the future.

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

pub trait FrameSource: Send {
    /// Wait for the next frame. Resolves to the frame time since the source was created.
    fn next_frame(&mut self) -> impl Future<Output = Duration> + Send;
}

/// Fixed-rate frames on the tokio clock.
#[derive(Debug)]
pub struct IntervalFrames {
    origin: Instant,
    ticker: Interval,
}

impl IntervalFrames {
    pub fn new(period: Duration) -> Self {
        let mut ticker = interval(period.max(Duration::from_millis(1)));
        // a stalled host drops frames rather than replaying them
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            origin: Instant::now(),
            ticker,
        }
    }
}

impl FrameSource for IntervalFrames {
    async fn next_frame(&mut self) -> Duration {
        let at = self.ticker.tick().await;
        at.saturating_duration_since(self.origin)
    }
}
