use std::time::{Duration, Instant};

use crate::shared::constants::DEFAULT_REFRESH_HZ;

/// Paces the detection loop at the display refresh rate.
pub trait RefreshClock: Send {
    /// Block until the next tick. Returns how many ticks elapsed unseen
    /// since the previous call; those are dropped, never replayed.
    fn wait_next(&mut self) -> u64;
}

/// Fixed-rate ticks anchored at the first call.
pub struct IntervalClock {
    interval: Duration,
    next: Option<Instant>,
}

impl IntervalClock {
    pub fn new(hz: f64) -> Self {
        let hz = if hz.is_finite() && hz > 0.0 {
            hz
        } else {
            DEFAULT_REFRESH_HZ
        };
        Self {
            interval: Duration::from_secs_f64(1.0 / hz),
            next: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_HZ)
    }
}

impl RefreshClock for IntervalClock {
    fn wait_next(&mut self) -> u64 {
        let now = Instant::now();
        let scheduled = self.next.unwrap_or(now + self.interval);
        let (target, dropped) = next_tick(scheduled, now, self.interval);
        if target > now {
            std::thread::sleep(target - now);
        }
        self.next = Some(target + self.interval);
        dropped
    }
}

/// First tick at or after `now`, starting from `scheduled`, and how many
/// scheduled ticks were skipped to reach it.
fn next_tick(scheduled: Instant, now: Instant, interval: Duration) -> (Instant, u64) {
    if scheduled >= now || interval.is_zero() {
        return (scheduled, 0);
    }
    let behind = now - scheduled;
    let missed = (behind.as_nanos() / interval.as_nanos()) as u64 + 1;
    (scheduled + interval * missed as u32, missed)
}
