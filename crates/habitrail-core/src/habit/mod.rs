//! Habit definitions as returned by the habit repository.

mod schedule;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use schedule::{HabitScheduleSettings, ScheduleEvaluator, WeekdaySet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(pub i64);

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a habit is tracked. Any kind is covered by its own record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitKind {
    #[default]
    Check,
    Count,
    Weight,
}

impl HabitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitKind::Check => "check",
            HabitKind::Count => "count",
            HabitKind::Weight => "weight",
        }
    }
}

/// Points granted on success and charged for a missed scheduled day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RewardSettings {
    #[serde(default)]
    pub success_points: u32,
    #[serde(default)]
    pub penalty_points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    #[serde(default)]
    pub kind: HabitKind,
    #[serde(default)]
    pub schedule: HabitScheduleSettings,
    #[serde(default)]
    pub reward_settings: RewardSettings,
    /// Soft-deleted habits are never reviewed.
    #[serde(default)]
    pub is_deleted: bool,
}

impl Habit {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: HabitId(id),
            name: name.into(),
            kind: HabitKind::default(),
            schedule: HabitScheduleSettings::default(),
            reward_settings: RewardSettings::default(),
            is_deleted: false,
        }
    }

    pub fn with_kind(mut self, kind: HabitKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_rewards(mut self, success_points: u32, penalty_points: u32) -> Self {
        self.reward_settings = RewardSettings {
            success_points,
            penalty_points,
        };
        self
    }

    pub fn with_weekdays(mut self, weekdays: WeekdaySet) -> Self {
        self.schedule = HabitScheduleSettings { weekdays };
        self
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }
}
