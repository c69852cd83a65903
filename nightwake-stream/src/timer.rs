//! Cancellable deadlines
//!
//! Timers are plain state. The owner reports its earliest deadline to the
//! event loop and fires whatever is due when woken, so a cancelled timer
//! can never run late against a torn-down session.

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;

/// A single pending deadline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline already scheduled at `at`
    pub fn at(at: Instant) -> Self {
        Self { at: Some(at) }
    }

    pub fn schedule_in(&mut self, delay: Duration) {
        self.at = Some(Instant::now() + delay);
    }

    /// Returns whether something was pending
    pub fn cancel(&mut self) -> bool {
        self.at.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.at.is_some()
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Clear and report the deadline if it has passed
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.at {
            Some(at) if at <= now => {
                self.at = None;
                true
            }
            _ => false,
        }
    }
}

/// Sleep timer keyed on a wall-clock deadline
///
/// The wall-clock value is kept for status reports. Firing is driven by
/// the monotonic deadline computed when the timer was set.
#[derive(Debug, Clone, Default)]
pub struct SleepTimer {
    deadline: Deadline,
    wall: Option<DateTime<Local>>,
}

impl SleepTimer {
    /// Arm the timer; a deadline not in the future cancels it instead
    ///
    /// Returns whether the timer is now armed.
    pub fn set(&mut self, wall: DateTime<Local>) -> bool {
        match (wall - Local::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => {
                self.deadline.schedule_in(remaining);
                self.wall = Some(wall);
                true
            }
            _ => {
                self.cancel();
                false
            }
        }
    }

    pub fn cancel(&mut self) -> bool {
        self.wall = None;
        self.deadline.cancel()
    }

    pub fn is_set(&self) -> bool {
        self.deadline.is_pending()
    }

    pub fn wall_deadline(&self) -> Option<DateTime<Local>> {
        self.wall
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline.instant()
    }

    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        let fired = self.deadline.fire_if_due(now);
        if fired {
            self.wall = None;
        }
        fired
    }
}
