//! Actuator critical section
//!
//! Both motor channels and the last-command timestamp live behind one lock.
//! Callers get whole operations (`drive`, `stop`, `stop_if_stale`) and never
//! the lock itself, so a command can never interleave with a watchdog stop.

use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::motor::{Motion, Motor};

/// Movement command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forwards,
    Backwards,
    Left,
    Right,
}

impl Direction {
    /// Channel motions for this direction as `(one, two)`
    pub fn motions(self) -> (Motion, Motion) {
        match self {
            Direction::Forwards => (Motion::Forwards, Motion::Forwards),
            Direction::Backwards => (Motion::Backwards, Motion::Backwards),
            Direction::Left => (Motion::Backwards, Motion::Forwards),
            Direction::Right => (Motion::Forwards, Motion::Backwards),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forwards => "forwards",
            Direction::Backwards => "backwards",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// Error returned when parsing an unknown direction name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDirection(pub String);

impl std::fmt::Display for UnknownDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown direction: {}", self.0)
    }
}

impl std::error::Error for UnknownDirection {}

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forwards" => Ok(Direction::Forwards),
            "backwards" => Ok(Direction::Backwards),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

struct Actuators {
    one: Box<dyn Motor>,
    two: Box<dyn Motor>,
    motions: (Motion, Motion),
    last_command: Option<Instant>,
}

impl Actuators {
    fn apply(&mut self, motions: (Motion, Motion)) {
        if let Err(e) = self.one.apply(motions.0) {
            tracing::warn!(error = %e, motion = %motions.0, "Motor one failed");
        }
        if let Err(e) = self.two.apply(motions.1) {
            tracing::warn!(error = %e, motion = %motions.1, "Motor two failed");
        }
        self.motions = motions;
    }

    fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        match self.last_command {
            Some(at) => now.saturating_duration_since(at) > threshold,
            None => true,
        }
    }
}

/// Shared owner of the two motor channels and the last-command time
pub struct ActuatorControl {
    inner: Mutex<Actuators>,
}

impl ActuatorControl {
    /// Take ownership of the two channels
    ///
    /// Channels are assumed stopped; no command has been seen yet.
    pub fn new(one: impl Motor, two: impl Motor) -> Self {
        Self {
            inner: Mutex::new(Actuators {
                one: Box::new(one),
                two: Box::new(two),
                motions: (Motion::Stopped, Motion::Stopped),
                last_command: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Actuators> {
        // A panic mid-command leaves channels in a valid state; keep going
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drive both channels for `direction` and record the command time
    ///
    /// Returns the recorded timestamp, which never goes backwards.
    pub fn drive(&self, direction: Direction) -> Instant {
        let mut actuators = self.lock();
        actuators.apply(direction.motions());

        let now = Instant::now();
        let stamp = match actuators.last_command {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        actuators.last_command = Some(stamp);
        stamp
    }

    /// Stop both channels
    ///
    /// Does not touch the last-command time.
    pub fn stop(&self) {
        self.lock().apply((Motion::Stopped, Motion::Stopped));
    }

    /// Stop both channels if no command arrived within `threshold`
    ///
    /// The check and the stop happen under one lock acquisition. Returns
    /// whether the channels were stopped.
    pub fn stop_if_stale(&self, now: Instant, threshold: Duration) -> bool {
        let mut actuators = self.lock();
        if actuators.is_stale(now, threshold) {
            actuators.apply((Motion::Stopped, Motion::Stopped));
            true
        } else {
            false
        }
    }

    /// Whether no command arrived within `threshold` of `now`
    pub fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        self.lock().is_stale(now, threshold)
    }

    /// Time of the last movement command
    pub fn last_command(&self) -> Option<Instant> {
        self.lock().last_command
    }

    /// Current channel motions as `(one, two)`
    pub fn motions(&self) -> (Motion, Motion) {
        self.lock().motions
    }
}
