//! Advisory countdown attached to the active question.
//!
//! Timers never run in the background: every call stamps the wall-clock time and
//! consumers derive what is left from the stored timestamp.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use thiserror::Error;

/// Countdown shown to every participant before a question accepts answers.
pub const READY_COUNTDOWN_SECONDS: u64 = 5;

/// Lifecycle status of a [`Timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Counting down.
    Start,
    /// Frozen; `duration` holds the remaining time.
    Stop,
    /// Armed and waiting for the next start.
    Reset,
    /// Terminal.
    End,
}

/// Error raised when a timer call does not follow the timer lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("timer cannot go from {from:?} to {to:?}")]
pub struct TimerError {
    /// Status the timer was in.
    pub from: TimerStatus,
    /// Status that was requested.
    pub to: TimerStatus,
}

/// Countdown state persisted with the question it belongs to.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    /// Current lifecycle status.
    pub status: TimerStatus,
    /// Length of the countdown measured from `timestamp`.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,
    /// Wall-clock time of the last lifecycle call.
    pub timestamp: SystemTime,
}

impl Timer {
    /// Build an armed timer in the `reset` status.
    pub fn new(duration: Duration, now: SystemTime) -> Self {
        Self {
            status: TimerStatus::Reset,
            duration,
            timestamp: now,
        }
    }

    /// Start counting down `duration` from `now`.
    pub fn start(&mut self, duration: Duration, now: SystemTime) -> Result<(), TimerError> {
        self.transition(TimerStatus::Start)?;
        self.duration = duration;
        self.timestamp = now;
        Ok(())
    }

    /// Freeze the countdown, keeping the remaining time as the new duration.
    pub fn stop(&mut self, now: SystemTime) -> Result<(), TimerError> {
        let remaining = self.remaining(now);
        self.transition(TimerStatus::Stop)?;
        self.duration = remaining;
        self.timestamp = now;
        Ok(())
    }

    /// Re-arm a stopped timer.
    pub fn reset(&mut self, now: SystemTime) -> Result<(), TimerError> {
        self.transition(TimerStatus::Reset)?;
        self.timestamp = now;
        Ok(())
    }

    /// End the timer for good. Ending twice is a no-op.
    pub fn expire(&mut self, now: SystemTime) {
        if self.status != TimerStatus::End {
            self.status = TimerStatus::End;
            self.timestamp = now;
        }
    }

    /// Time left on the countdown as seen at `now`.
    pub fn remaining(&self, now: SystemTime) -> Duration {
        match self.status {
            TimerStatus::Start => {
                let elapsed = now.duration_since(self.timestamp).unwrap_or_default();
                self.duration.saturating_sub(elapsed)
            }
            TimerStatus::Stop | TimerStatus::Reset => self.duration,
            TimerStatus::End => Duration::ZERO,
        }
    }

    /// Whether a running countdown has reached zero, or the timer has ended.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.status {
            TimerStatus::Start => self.remaining(now).is_zero(),
            TimerStatus::End => true,
            TimerStatus::Stop | TimerStatus::Reset => false,
        }
    }

    fn transition(&mut self, to: TimerStatus) -> Result<(), TimerError> {
        let allowed = matches!(
            (self.status, to),
            (TimerStatus::Reset, TimerStatus::Start)
                | (TimerStatus::Start, TimerStatus::Stop)
                | (TimerStatus::Stop, TimerStatus::Reset)
        );
        if !allowed {
            return Err(TimerError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn remaining_time_is_derived_from_timestamp() {
        let mut timer = Timer::new(Duration::from_secs(30), at(0));
        timer.start(Duration::from_secs(30), at(100)).unwrap();

        assert_eq!(timer.remaining(at(110)), Duration::from_secs(20));
        assert!(!timer.is_expired(at(129)));
        assert!(timer.is_expired(at(130)));
        assert_eq!(timer.remaining(at(500)), Duration::ZERO);
    }

    #[test]
    fn stop_freezes_remaining_time() {
        let mut timer = Timer::new(Duration::from_secs(30), at(0));
        timer.start(Duration::from_secs(30), at(0)).unwrap();
        timer.stop(at(12)).unwrap();

        assert_eq!(timer.status, TimerStatus::Stop);
        assert_eq!(timer.remaining(at(1_000)), Duration::from_secs(18));

        timer.reset(at(50)).unwrap();
        timer.start(timer.duration, at(50)).unwrap();
        assert_eq!(timer.remaining(at(60)), Duration::from_secs(8));
    }

    #[test]
    fn lifecycle_is_cyclic() {
        let mut timer = Timer::new(Duration::from_secs(5), at(0));

        let err = timer.stop(at(1)).unwrap_err();
        assert_eq!(err.from, TimerStatus::Reset);
        assert_eq!(err.to, TimerStatus::Stop);

        timer.start(Duration::from_secs(5), at(1)).unwrap();
        assert!(timer.reset(at(2)).is_err());
        assert!(timer.start(Duration::from_secs(5), at(2)).is_err());
    }

    #[test]
    fn ended_timer_cannot_be_reused() {
        let mut timer = Timer::new(Duration::from_secs(5), at(0));
        timer.start(Duration::from_secs(5), at(0)).unwrap();
        timer.expire(at(1));
        timer.expire(at(2));

        assert_eq!(timer.timestamp, at(1));
        assert!(timer.reset(at(3)).is_err());
        assert!(timer.start(Duration::from_secs(5), at(3)).is_err());
        assert!(timer.is_expired(at(1)));
    }
}
