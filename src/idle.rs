//! Local idle detection for the `IDLE_STATUS` presence message.
//!
//! DESIGN
//! ======
//! Pointer activity keeps the user `active`; no activity for the idle
//! threshold turns them `idle`; a hidden page makes them `away`. Only
//! transitions are reported, so peers receive one message per change.
//!
//! Time is passed in explicitly so the owning session decides the clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserIdleState {
    #[default]
    Active,
    Away,
    Idle,
}

pub struct IdleTracker {
    state: UserIdleState,
    idle_after: Duration,
    deadline: Option<Instant>,
}

impl IdleTracker {
    #[must_use]
    pub fn new(idle_after: Duration) -> Self {
        Self { state: UserIdleState::Active, idle_after, deadline: None }
    }

    #[must_use]
    pub fn state(&self) -> UserIdleState {
        self.state
    }

    /// When the current activity window runs out, if armed.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Arm the tracker at session activation.
    pub fn start(&mut self, now: Instant) {
        self.state = UserIdleState::Active;
        self.deadline = Some(now + self.idle_after);
    }

    /// Disarm at teardown.
    pub fn stop(&mut self) {
        self.state = UserIdleState::Active;
        self.deadline = None;
    }

    /// Pointer moved. Returns the new state if it changed.
    pub fn on_activity(&mut self, now: Instant) -> Option<UserIdleState> {
        self.deadline = Some(now + self.idle_after);
        self.transition(UserIdleState::Active)
    }

    /// Page visibility changed. Returns the new state if it changed.
    pub fn on_visibility(&mut self, hidden: bool, now: Instant) -> Option<UserIdleState> {
        if hidden {
            self.deadline = None;
            self.transition(UserIdleState::Away)
        } else {
            self.on_activity(now)
        }
    }

    /// Idle deadline check. Returns `Some(Idle)` exactly once per idle period.
    pub fn poll(&mut self, now: Instant) -> Option<UserIdleState> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.transition(UserIdleState::Idle)
            }
            _ => None,
        }
    }

    fn transition(&mut self, next: UserIdleState) -> Option<UserIdleState> {
        if self.state == next {
            return None;
        }
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
#[path = "idle_test.rs"]
mod tests;
