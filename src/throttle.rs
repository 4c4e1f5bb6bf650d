//! Full-scene resync throttle.
//!
//! DESIGN
//! ======
//! Leading + trailing throttle with one window. The first trigger after a
//! quiet window fires immediately; any triggers inside the window collapse
//! into a single trailing fire at the window boundary. The caller reads the
//! scene at fire time, so the trailing send always carries the latest state.
//!
//! Time is passed in explicitly (`now`), mirroring the sliding-window rate
//! limiter, so the owning session can drive it from a paused test clock.

use std::time::Duration;

use tokio::time::Instant;

pub struct ResyncThrottle {
    interval: Duration,
    last_fired: Option<Instant>,
    pending: Option<Instant>,
}

impl ResyncThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_fired: None, pending: None }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Request a resync. Returns `true` when the caller should send now.
    pub fn trigger(&mut self, now: Instant) -> bool {
        if self.pending.is_some() {
            return false;
        }
        match self.last_fired {
            Some(last) if now < last + self.interval => {
                self.pending = Some(last + self.interval);
                false
            }
            _ => {
                self.last_fired = Some(now);
                true
            }
        }
    }

    /// Boundary of the scheduled trailing fire, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    /// Returns `true` once when the trailing fire is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(deadline) if deadline <= now => {
                self.pending = None;
                self.last_fired = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Drop any scheduled fire and forget the window.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.last_fired = None;
    }
}

#[cfg(test)]
#[path = "throttle_test.rs"]
mod tests;
