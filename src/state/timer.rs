//! Per-round countdown.
//!
//! The timer is advisory. The server pushes `ForceSubmit` when a round is
//! over, but a locally expired timer triggers the same submission so a late
//! server signal does not strand an unsent guess.
//!
//! There is no background thread: the owner calls [`RoundTimer::tick_at`]
//! from its event loop and the timer reports when the next tick is due.

use chrono::{DateTime, Duration, Utc};

/// Default round length (30 seconds).
pub const DEFAULT_ROUND_SECONDS: u32 = 30;

/// Default display tick interval (1 second).
pub const DEFAULT_TICK_SECONDS: u32 = 1;

/// Result of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Still counting; carries whole seconds left
    Tick(u32),
    /// Deadline reached. Reported once per `start`.
    Expired,
}

#[derive(Debug, Clone)]
pub struct RoundTimer {
    deadline: Option<DateTime<Utc>>,
    next_tick: Option<DateTime<Utc>>,
    tick_interval: Duration,
}

impl Default for RoundTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::with_tick_interval(DEFAULT_TICK_SECONDS)
    }

    pub fn with_tick_interval(seconds: u32) -> Self {
        Self {
            deadline: None,
            next_tick: None,
            tick_interval: Duration::seconds(i64::from(seconds.max(1))),
        }
    }

    /// Start (or restart) the countdown from the wall clock.
    pub fn start(&mut self, duration_seconds: u32) {
        self.start_at(Utc::now(), duration_seconds);
    }

    /// Start (or restart) the countdown from `now`. Supersedes any running
    /// countdown.
    pub fn start_at(&mut self, now: DateTime<Utc>, duration_seconds: u32) {
        self.deadline = Some(now + Duration::seconds(i64::from(duration_seconds)));
        self.next_tick = Some(now + self.tick_interval);
    }

    /// Cancel the countdown. `remaining` reads zero afterwards.
    pub fn stop(&mut self) {
        self.deadline = None;
        self.next_tick = None;
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// When the owner should call `tick_at` next, if the timer is running.
    pub fn next_tick(&self) -> Option<DateTime<Utc>> {
        self.next_tick
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining_at(Utc::now())
    }

    /// Whole seconds until the deadline, floored, never negative.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u32 {
        match self.deadline {
            Some(deadline) => {
                let secs = (deadline - now).num_seconds().max(0);
                u32::try_from(secs).unwrap_or(u32::MAX)
            }
            None => 0,
        }
    }

    /// Advance the countdown.
    ///
    /// Returns `None` when the timer is stopped or the next tick is not yet
    /// due. Once `Expired` has been returned the timer stops rescheduling
    /// until the next `start`.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Option<TimerEvent> {
        let due = self.next_tick?;
        let remaining = self.remaining_at(now);

        if remaining == 0 {
            self.next_tick = None;
            return Some(TimerEvent::Expired);
        }
        if now < due {
            return None;
        }

        self.next_tick = Some(now + self.tick_interval);
        Some(TimerEvent::Tick(remaining))
    }
}
