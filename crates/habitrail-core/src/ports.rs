//! Collaborator interfaces consumed by the review engine.
//!
//! All calls are asynchronous and may fail; the engine runs on a single
//! cooperative thread, so implementations need not be `Send`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::activity::ActivityRecord;
use crate::clock::DayWindow;
use crate::error::CoreResult;
use crate::habit::{Habit, HabitId};
use crate::review::ReviewRecord;
use crate::session::{SessionState, SessionUpdate};

#[async_trait(?Send)]
pub trait HabitRepository {
    async fn list(&self, include_deleted: bool) -> CoreResult<Vec<Habit>>;
}

/// Raw activity with no day filtering; filtering is the engine's job.
#[async_trait(?Send)]
pub trait ActivityRepository {
    async fn list_checks(&self) -> CoreResult<Vec<ActivityRecord>>;

    async fn list_counts(&self) -> CoreResult<Vec<ActivityRecord>>;

    async fn list_weight_updates(&self) -> CoreResult<Vec<ActivityRecord>>;

    /// Record a parent-level check.
    async fn record_check(&self, habit_id: HabitId, timestamp: DateTime<Utc>) -> CoreResult<()>;

    /// Remove parent-level checks for `habit_id` inside `window`.
    /// Returns the number of removed records.
    async fn remove_checks(&self, habit_id: HabitId, window: &DayWindow) -> CoreResult<usize>;
}

/// Every call moves the balance; callers must invoke once per logical event.
#[async_trait(?Send)]
pub trait RewardLedger {
    async fn add(&self, amount: u32) -> CoreResult<()>;

    async fn subtract(&self, amount: u32) -> CoreResult<()>;

    async fn balance(&self) -> CoreResult<i64>;
}

#[async_trait(?Send)]
pub trait SessionStore {
    async fn get(&self) -> CoreResult<SessionState>;

    /// Apply a partial update atomically.
    async fn update(&self, update: SessionUpdate) -> CoreResult<()>;
}

/// Append-only history of resolved review days.
#[async_trait(?Send)]
pub trait ReviewJournal {
    async fn append(&self, record: &ReviewRecord) -> CoreResult<()>;
}
