//! Logical-day calendar arithmetic.
//!
//! A logical day starts at a user-chosen rollover hour instead of midnight.
//! Every computation here works on the observer's *local* calendar fields;
//! UTC fields are never used to decide which day a moment belongs to.

mod logical;
mod provider;

pub use logical::{DayWindow, LogicalClock, LogicalDate, ObserverZone, RolloverHour, WallClockMoment};
pub use provider::{FixedClock, SystemClock, TimeProvider};
