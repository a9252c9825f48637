//! Ladder clock: the source of "now" for virtual reign closes, default
//! match timestamps and `last_updated` stamps.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderClock {
    /// Wall-clock time.
    System,
    /// Frozen instant (tests and reproducible reports).
    Fixed(DateTime<Utc>),
}

impl LadderClock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            LadderClock::System => Utc::now(),
            LadderClock::Fixed(at) => *at,
        }
    }

    /// Move a fixed clock forward. No-op on the system clock.
    pub fn advance(&mut self, by: Duration) {
        if let LadderClock::Fixed(at) = self {
            *at += by;
        }
    }
}

impl Default for LadderClock {
    fn default() -> Self {
        LadderClock::System
    }
}
