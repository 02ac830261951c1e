//! Daily review: detect missed logical days and reconcile them.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Detecting -> AwaitingDecision -> Finalizing -> Idle
//!            |                 ^
//!            +--> Idle         +-- toggle habit / next day
//! ```
//!
//! The persisted [`PendingReview`](crate::session::PendingReview) is the
//! single source of truth for which day is under review. Per-day decision
//! state lives only in memory and is rebuilt from activity on reload.

mod catch_up;
mod reconciler;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::clock::{LogicalDate, WallClockMoment};
use crate::habit::HabitId;
use crate::session::PendingReview;

pub use catch_up::missed_days;
pub use reconciler::{ReviewOptions, ReviewReconciler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPhase {
    Idle,
    Detecting,
    AwaitingDecision,
    Finalizing,
}

impl ReviewPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewPhase::Idle => "idle",
            ReviewPhase::Detecting => "detecting",
            ReviewPhase::AwaitingDecision => "awaiting_decision",
            ReviewPhase::Finalizing => "finalizing",
        }
    }
}

/// What the user is being offered for the current day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    /// Nothing was missed: celebrate and finalize.
    Perfect,
    /// Missed habits remain: complete them, apply penalties or skip.
    Pending,
    /// Every missed habit has been completed since: advance.
    Complete,
    /// Review data could not be loaded: the day can only be skipped or
    /// closed without judging it.
    Unverified,
}

/// Result of a detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DetectOutcome {
    /// First session ever; the session date was initialized.
    FirstSession { today: LogicalDate },
    NoReviewDue { today: LogicalDate },
    /// A pending review already existed and was adopted unchanged.
    Resumed { pending: PendingReview },
    Created { pending: PendingReview },
    /// A newer detection pass started before this one finished.
    Superseded,
}

/// Review state for one missed logical day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayReview {
    pub date: LogicalDate,
    pub scheduled: BTreeSet<HabitId>,
    /// Scheduled but not covered when the day was loaded.
    pub uncompleted: BTreeSet<HabitId>,
    /// Habits the user completed during this review.
    pub completed: BTreeSet<HabitId>,
    /// Set when habits or activity could not be fetched.
    pub load_error: Option<String>,
}

impl DayReview {
    pub fn outstanding(&self) -> BTreeSet<HabitId> {
        self.uncompleted.difference(&self.completed).copied().collect()
    }

    /// Whether habits and activity loaded, so coverage was actually
    /// evaluated.
    pub fn is_verified(&self) -> bool {
        self.load_error.is_none()
    }

    pub fn is_perfect(&self) -> bool {
        self.is_verified() && self.uncompleted.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.is_verified() && self.uncompleted.is_subset(&self.completed)
    }

    pub fn mode(&self) -> DecisionMode {
        if !self.is_verified() {
            DecisionMode::Unverified
        } else if self.is_perfect() {
            DecisionMode::Perfect
        } else if self.is_complete() {
            DecisionMode::Complete
        } else {
            DecisionMode::Pending
        }
    }
}

/// Point-in-time view of the reconciler for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSnapshot {
    pub phase: ReviewPhase,
    pub pending: Option<PendingReview>,
    pub days: Vec<DayReview>,
    pub current: usize,
    /// Penalty that `apply_penalties` would charge right now.
    pub outstanding_penalty: u32,
}

impl ReviewSnapshot {
    pub fn current_day(&self) -> Option<&DayReview> {
        self.days.get(self.current)
    }

    pub fn is_last_day(&self) -> bool {
        self.current + 1 >= self.days.len()
    }
}

/// How a review was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Perfect,
    AllComplete,
    PenaltiesApplied,
    Skipped,
    /// Journal-only: the day was closed while its data could not be loaded.
    Unverified,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Perfect => "perfect",
            Resolution::AllComplete => "all_complete",
            Resolution::PenaltiesApplied => "penalties_applied",
            Resolution::Skipped => "skipped",
            Resolution::Unverified => "unverified",
        }
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perfect" => Ok(Resolution::Perfect),
            "all_complete" => Ok(Resolution::AllComplete),
            "penalties_applied" => Ok(Resolution::PenaltiesApplied),
            "skipped" => Ok(Resolution::Skipped),
            "unverified" => Ok(Resolution::Unverified),
            other => Err(format!("unknown resolution: {other}")),
        }
    }
}

/// Outcome of a finalize or skip. Remote failures are collected here
/// instead of aborting the exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeReport {
    pub resolution: Resolution,
    pub review_date: LogicalDate,
    pub penalty: u32,
    /// New session date, when it was advanced.
    pub advanced_to: Option<LogicalDate>,
    pub failures: Vec<String>,
}

impl FinalizeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    NextDay { date: LogicalDate },
    Finalized { report: FinalizeReport },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub habit_id: HabitId,
    pub completed: bool,
    pub mode: DecisionMode,
    /// Set when the check was stored but the reward write failed.
    pub reward_error: Option<String>,
}

/// Journal entry for one resolved day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub date: LogicalDate,
    pub resolution: Resolution,
    pub scheduled: usize,
    pub completed: usize,
    pub penalty: u32,
    pub recorded_at: WallClockMoment,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(uncompleted: &[i64], completed: &[i64]) -> DayReview {
        DayReview {
            date: "2024-01-15".parse().unwrap(),
            scheduled: uncompleted.iter().map(|i| HabitId(*i)).collect(),
            uncompleted: uncompleted.iter().map(|i| HabitId(*i)).collect(),
            completed: completed.iter().map(|i| HabitId(*i)).collect(),
            load_error: None,
        }
    }

    #[test]
    fn decision_modes() {
        assert_eq!(day(&[], &[]).mode(), DecisionMode::Perfect);
        assert_eq!(day(&[1, 2], &[1]).mode(), DecisionMode::Pending);
        assert_eq!(day(&[1, 2], &[2, 1]).mode(), DecisionMode::Complete);
    }

    #[test]
    fn unloaded_day_is_never_perfect() {
        let mut d = day(&[], &[]);
        d.load_error = Some("activity unavailable".into());
        assert!(!d.is_perfect());
        assert!(!d.is_complete());
        assert_eq!(d.mode(), DecisionMode::Unverified);
    }

    #[test]
    fn outstanding_is_difference() {
        let d = day(&[1, 2, 3], &[2]);
        assert_eq!(d.outstanding(), BTreeSet::from([HabitId(1), HabitId(3)]));
    }

    #[test]
    fn resolution_round_trips_through_str() {
        for r in [
            Resolution::Perfect,
            Resolution::AllComplete,
            Resolution::PenaltiesApplied,
            Resolution::Skipped,
            Resolution::Unverified,
        ] {
            assert_eq!(r.as_str().parse::<Resolution>().unwrap(), r);
        }
    }
}
