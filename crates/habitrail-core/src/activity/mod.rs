//! Activity records: checks, count entries and weight updates.

mod coverage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::habit::HabitId;

pub use coverage::{covered_habit_ids, ActivityCoverageIndex};

fn default_true() -> bool {
    true
}

/// A single tracked event. Timestamps are absolute; they are localized by
/// the caller's zone before any day arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityRecord {
    Check {
        habit_id: HabitId,
        #[serde(default)]
        sub_habit_id: Option<i64>,
        #[serde(default = "default_true")]
        checked: bool,
        timestamp: DateTime<Utc>,
    },
    CountEntry {
        habit_id: HabitId,
        value: f64,
        timestamp: DateTime<Utc>,
    },
    WeightEntry {
        habit_id: HabitId,
        weight: f64,
        timestamp: DateTime<Utc>,
    },
}

impl ActivityRecord {
    pub fn check(habit_id: HabitId, timestamp: DateTime<Utc>) -> Self {
        ActivityRecord::Check {
            habit_id,
            sub_habit_id: None,
            checked: true,
            timestamp,
        }
    }

    pub fn sub_check(habit_id: HabitId, sub_habit_id: i64, timestamp: DateTime<Utc>) -> Self {
        ActivityRecord::Check {
            habit_id,
            sub_habit_id: Some(sub_habit_id),
            checked: true,
            timestamp,
        }
    }

    pub fn count(habit_id: HabitId, value: f64, timestamp: DateTime<Utc>) -> Self {
        ActivityRecord::CountEntry {
            habit_id,
            value,
            timestamp,
        }
    }

    pub fn weight(habit_id: HabitId, weight: f64, timestamp: DateTime<Utc>) -> Self {
        ActivityRecord::WeightEntry {
            habit_id,
            weight,
            timestamp,
        }
    }

    pub fn habit_id(&self) -> HabitId {
        match self {
            ActivityRecord::Check { habit_id, .. }
            | ActivityRecord::CountEntry { habit_id, .. }
            | ActivityRecord::WeightEntry { habit_id, .. } => *habit_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ActivityRecord::Check { timestamp, .. }
            | ActivityRecord::CountEntry { timestamp, .. }
            | ActivityRecord::WeightEntry { timestamp, .. } => *timestamp,
        }
    }

    /// Whether this record can cover its parent habit. A sub-habit check
    /// never completes the parent.
    pub fn counts_for_parent(&self) -> bool {
        match self {
            ActivityRecord::Check {
                sub_habit_id,
                checked,
                ..
            } => sub_habit_id.is_none() && *checked,
            ActivityRecord::CountEntry { .. } | ActivityRecord::WeightEntry { .. } => true,
        }
    }
}
