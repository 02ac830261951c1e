//! In-memory collaborators for review engine tests.
//!
//! Every async call yields once before touching state, so futures joined
//! with `tokio::join!` interleave the way remote calls would.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use habitrail_core::ports::{
    ActivityRepository, HabitRepository, ReviewJournal, RewardLedger, SessionStore,
};
use habitrail_core::{
    ActivityRecord, CoreError, CoreResult, DayWindow, FixedClock, Habit, HabitId, LogicalDate,
    ObserverZone, ReviewRecord, SessionState, SessionUpdate, WallClockMoment,
};

// ============================================================================
// Backend
// ============================================================================

#[derive(Default)]
pub struct MemoryBackend {
    pub habits: RefCell<Vec<Habit>>,
    pub records: RefCell<Vec<ActivityRecord>>,
    pub balance: Cell<i64>,
    pub session: RefCell<SessionState>,
    pub journal: RefCell<Vec<ReviewRecord>>,
    calls: RefCell<Vec<String>>,
    failing: RefCell<HashSet<&'static str>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_habits(self, habits: Vec<Habit>) -> Self {
        *self.habits.borrow_mut() = habits;
        self
    }

    pub fn with_records(self, records: Vec<ActivityRecord>) -> Self {
        *self.records.borrow_mut() = records;
        self
    }

    pub fn with_last_session(self, date: &str) -> Self {
        self.session.borrow_mut().last_session_date = Some(date.parse().unwrap());
        self
    }

    /// Make every call to `op` fail until [`Self::heal`].
    pub fn fail(&self, op: &'static str) {
        self.failing.borrow_mut().insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.failing.borrow_mut().remove(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn state(&self) -> SessionState {
        self.session.borrow().clone()
    }

    async fn enter(&self, op: &'static str, detail: String) -> Result<(), &'static str> {
        tokio::task::yield_now().await;
        let entry = if detail.is_empty() {
            op.to_string()
        } else {
            format!("{op}({detail})")
        };
        self.calls.borrow_mut().push(entry);
        if self.failing.borrow().contains(op) {
            return Err("injected failure");
        }
        Ok(())
    }

    async fn read(&self, op: &'static str) -> CoreResult<()> {
        self.enter(op, String::new())
            .await
            .map_err(|e| CoreError::read(op, e))
    }

    async fn write(&self, op: &'static str, detail: String) -> CoreResult<()> {
        self.enter(op, detail)
            .await
            .map_err(|e| CoreError::mutation(op, e))
    }
}

#[async_trait(?Send)]
impl HabitRepository for MemoryBackend {
    async fn list(&self, include_deleted: bool) -> CoreResult<Vec<Habit>> {
        self.read("habits.list").await?;
        Ok(self
            .habits
            .borrow()
            .iter()
            .filter(|h| include_deleted || !h.is_deleted)
            .cloned()
            .collect())
    }
}

#[async_trait(?Send)]
impl ActivityRepository for MemoryBackend {
    async fn list_checks(&self) -> CoreResult<Vec<ActivityRecord>> {
        self.read("activity.checks").await?;
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|r| matches!(r, ActivityRecord::Check { .. }))
            .cloned()
            .collect())
    }

    async fn list_counts(&self) -> CoreResult<Vec<ActivityRecord>> {
        self.read("activity.counts").await?;
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|r| matches!(r, ActivityRecord::CountEntry { .. }))
            .cloned()
            .collect())
    }

    async fn list_weight_updates(&self) -> CoreResult<Vec<ActivityRecord>> {
        self.read("activity.weights").await?;
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|r| matches!(r, ActivityRecord::WeightEntry { .. }))
            .cloned()
            .collect())
    }

    async fn record_check(&self, habit_id: HabitId, timestamp: DateTime<Utc>) -> CoreResult<()> {
        self.write("activity.record_check", format!("{habit_id}")).await?;
        self.records
            .borrow_mut()
            .push(ActivityRecord::check(habit_id, timestamp));
        Ok(())
    }

    async fn remove_checks(&self, habit_id: HabitId, window: &DayWindow) -> CoreResult<usize> {
        self.write("activity.remove_checks", format!("{habit_id}")).await?;
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|r| {
            !matches!(r, ActivityRecord::Check { habit_id: id, sub_habit_id: None, timestamp, .. }
                if *id == habit_id && window.contains(*timestamp))
        });
        Ok(before - records.len())
    }
}

#[async_trait(?Send)]
impl RewardLedger for MemoryBackend {
    async fn add(&self, amount: u32) -> CoreResult<()> {
        self.write("reward.add", amount.to_string()).await?;
        self.balance.set(self.balance.get() + i64::from(amount));
        Ok(())
    }

    async fn subtract(&self, amount: u32) -> CoreResult<()> {
        self.write("reward.subtract", amount.to_string()).await?;
        self.balance.set(self.balance.get() - i64::from(amount));
        Ok(())
    }

    async fn balance(&self) -> CoreResult<i64> {
        self.read("reward.balance").await?;
        Ok(self.balance.get())
    }
}

#[async_trait(?Send)]
impl SessionStore for MemoryBackend {
    async fn get(&self) -> CoreResult<SessionState> {
        self.read("session.get").await?;
        Ok(self.session.borrow().clone())
    }

    async fn update(&self, update: SessionUpdate) -> CoreResult<()> {
        let mut detail = Vec::new();
        if let Some(date) = update.last_session_date {
            detail.push(format!("last={date}"));
        }
        if let Some(pending) = update.pending_review {
            match pending {
                Some(p) => detail.push(format!("pending={}", p.review_date)),
                None => detail.push("pending=null".to_string()),
            }
        }
        self.write("session.update", detail.join(",")).await?;
        update.apply_to(&mut self.session.borrow_mut());
        Ok(())
    }
}

#[async_trait(?Send)]
impl ReviewJournal for MemoryBackend {
    async fn append(&self, record: &ReviewRecord) -> CoreResult<()> {
        self.write("journal.append", record.date.to_string()).await?;
        self.journal.borrow_mut().push(record.clone());
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn date(s: &str) -> LogicalDate {
    s.parse().unwrap()
}

pub fn moment(s: &str) -> WallClockMoment {
    WallClockMoment::parse(s, &ObserverZone::utc()).unwrap()
}

pub fn utc(s: &str) -> DateTime<Utc> {
    moment(s).instant()
}

pub fn clock_at(s: &str) -> FixedClock {
    FixedClock::new(moment(s))
}
