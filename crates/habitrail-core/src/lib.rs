//! # Habitrail Core Library
//!
//! This library provides the core logic for the Habitrail habit tracker:
//! deciding which calendar day a moment belongs to when the user's day ends
//! after midnight, and reconciling missed days through a daily review.
//! All operations are available via the standalone `habitrail` CLI, which
//! is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Clock**: Logical-day arithmetic around a configurable rollover hour,
//!   with an injectable [`TimeProvider`]
//! - **Habits and activity**: Weekday schedules and coverage of a logical
//!   day by checks, count entries and weight updates
//! - **Session**: Cross-device state (rollover hour, last session date,
//!   pending review)
//! - **Review**: The [`ReviewReconciler`] state machine that detects,
//!   resolves and finalizes daily reviews
//! - **Storage**: SQLite persistence and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`LogicalClock`]: Maps wall-clock moments to logical dates
//! - [`ReviewReconciler`]: Daily review state machine
//! - [`Database`]: Local implementation of every collaborator port
//! - [`Config`]: Application configuration management

pub mod activity;
pub mod clock;
pub mod error;
pub mod habit;
pub mod ports;
pub mod review;
pub mod session;
pub mod storage;

pub use activity::{ActivityCoverageIndex, ActivityRecord};
pub use clock::{
    DayWindow, FixedClock, LogicalClock, LogicalDate, ObserverZone, RolloverHour, SystemClock,
    TimeProvider, WallClockMoment,
};
pub use error::{ConfigError, CoreError, CoreResult, DatabaseError};
pub use habit::{Habit, HabitId, HabitKind, ScheduleEvaluator, WeekdaySet};
pub use review::{
    AdvanceOutcome, DayReview, DecisionMode, DetectOutcome, FinalizeReport, Resolution,
    ReviewOptions, ReviewPhase, ReviewReconciler, ReviewRecord, ReviewSnapshot, ToggleOutcome,
};
pub use session::{PendingReview, SessionLedger, SessionState, SessionUpdate};
pub use storage::{Config, Database};
