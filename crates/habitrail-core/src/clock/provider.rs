//! Injected sources of "now".
//!
//! The reconciler never reads the system clock directly; callers pass a
//! [`TimeProvider`], so tests and the CLI's `--now` flag can pin time.

use std::cell::Cell;

use chrono::{Duration, Local};

use super::logical::{ObserverZone, WallClockMoment};

pub trait TimeProvider {
    fn now(&self) -> WallClockMoment;

    /// Zone used to localize stored UTC timestamps.
    fn zone(&self) -> ObserverZone;
}

/// Reads the operating system clock and timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now(&self) -> WallClockMoment {
        WallClockMoment::new(Local::now().fixed_offset())
    }

    fn zone(&self) -> ObserverZone {
        ObserverZone::System
    }
}

/// A clock pinned to a moment, movable by hand.
///
/// The zone is the fixed offset of the initial moment.
#[derive(Debug)]
pub struct FixedClock {
    moment: Cell<WallClockMoment>,
    zone: ObserverZone,
}

impl FixedClock {
    pub fn new(moment: WallClockMoment) -> Self {
        Self {
            moment: Cell::new(moment),
            zone: ObserverZone::Fixed(moment.offset()),
        }
    }

    pub fn set(&self, moment: WallClockMoment) {
        self.moment.set(moment);
    }

    pub fn advance(&self, delta: Duration) {
        self.moment.set(self.moment.get().plus(delta));
    }
}

impl TimeProvider for FixedClock {
    fn now(&self) -> WallClockMoment {
        self.moment.get()
    }

    fn zone(&self) -> ObserverZone {
        self.zone
    }
}
