//! SQLite-backed storage for habits, activity, rewards and session state.
//!
//! Provides persistent storage for:
//! - Habit definitions
//! - Checks, count entries and weight updates
//! - Reward events (the balance is their sum)
//! - Review journal
//! - Key-value store for the session state
//!
//! [`Database`] implements every collaborator trait in [`crate::ports`],
//! so a single local file can back the review engine.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::data_dir;
use super::migrations;
use crate::activity::ActivityRecord;
use crate::clock::{DayWindow, LogicalDate, RolloverHour, WallClockMoment};
use crate::error::{CoreError, CoreResult, DatabaseError};
use crate::habit::{Habit, HabitId, HabitKind, HabitScheduleSettings, RewardSettings, WeekdaySet};
use crate::ports::{ActivityRepository, HabitRepository, ReviewJournal, RewardLedger, SessionStore};
use crate::review::{ReviewRecord, Resolution};
use crate::session::{SessionState, SessionUpdate};

const SESSION_KEY: &str = "session_state";

/// Format a timestamp so that text order matches time order.
fn stamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_stamp(raw: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidTimestamp(format!("{raw}: {e}")))
}

fn corrupt(table: &'static str, message: impl std::fmt::Display) -> CoreError {
    DatabaseError::CorruptRow {
        table,
        message: message.to_string(),
    }
    .into()
}

fn parse_kind(raw: &str) -> CoreResult<HabitKind> {
    match raw {
        "check" => Ok(HabitKind::Check),
        "count" => Ok(HabitKind::Count),
        "weight" => Ok(HabitKind::Weight),
        other => Err(corrupt("habits", format!("unknown kind '{other}'"))),
    }
}

/// SQLite database for habit tracking state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/habitrail.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> CoreResult<Self> {
        Self::open_at(&data_dir()?.join("habitrail.db"))
    }

    pub fn open_at(path: &Path) -> CoreResult<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> CoreResult<()> {
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()).into())
    }

    // ── Habits ──────────────────────────────────────────────────────────

    /// Insert or replace a habit definition.
    pub fn upsert_habit(&self, habit: &Habit) -> CoreResult<()> {
        let weekdays = serde_json::to_string(&habit.schedule.weekdays)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO habits
                (id, name, kind, weekdays, success_points, penalty_points, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                habit.id.0,
                habit.name,
                habit.kind.as_str(),
                weekdays,
                habit.reward_settings.success_points,
                habit.reward_settings.penalty_points,
                habit.is_deleted,
            ],
        )?;
        Ok(())
    }

    pub fn habits(&self, include_deleted: bool) -> CoreResult<Vec<Habit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, weekdays, success_points, penalty_points, is_deleted
             FROM habits
             WHERE ?1 OR is_deleted = 0
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![include_deleted], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, u32>(5)?,
                row.get::<_, bool>(6)?,
            ))
        })?;

        let mut habits = Vec::new();
        for row in rows {
            let (id, name, kind, weekdays, success_points, penalty_points, is_deleted) = row?;
            let weekdays: WeekdaySet =
                serde_json::from_str(&weekdays).map_err(|e| corrupt("habits", e))?;
            habits.push(Habit {
                id: HabitId(id),
                name,
                kind: parse_kind(&kind)?,
                schedule: HabitScheduleSettings { weekdays },
                reward_settings: RewardSettings {
                    success_points,
                    penalty_points,
                },
                is_deleted,
            });
        }
        Ok(habits)
    }

    // ── Activity ────────────────────────────────────────────────────────

    /// Store one activity record. Returns its row id.
    pub fn insert_activity(&self, record: &ActivityRecord) -> CoreResult<i64> {
        match record {
            ActivityRecord::Check {
                habit_id,
                sub_habit_id,
                checked,
                timestamp,
            } => self.conn.execute(
                "INSERT INTO checks (habit_id, sub_habit_id, checked, check_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![habit_id.0, sub_habit_id, checked, stamp(*timestamp)],
            )?,
            ActivityRecord::CountEntry {
                habit_id,
                value,
                timestamp,
            } => self.conn.execute(
                "INSERT INTO counts (habit_id, value, created_at) VALUES (?1, ?2, ?3)",
                params![habit_id.0, value, stamp(*timestamp)],
            )?,
            ActivityRecord::WeightEntry {
                habit_id,
                weight,
                timestamp,
            } => self.conn.execute(
                "INSERT INTO weight_updates (habit_id, weight, created_at) VALUES (?1, ?2, ?3)",
                params![habit_id.0, weight, stamp(*timestamp)],
            )?,
        };
        Ok(self.conn.last_insert_rowid())
    }

    pub fn checks(&self) -> CoreResult<Vec<ActivityRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT habit_id, sub_habit_id, checked, check_date FROM checks ORDER BY check_date, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (habit_id, sub_habit_id, checked, raw) = row?;
            records.push(ActivityRecord::Check {
                habit_id: HabitId(habit_id),
                sub_habit_id,
                checked,
                timestamp: parse_stamp(&raw)?,
            });
        }
        Ok(records)
    }

    pub fn counts(&self) -> CoreResult<Vec<ActivityRecord>> {
        self.measurements("counts", "value", |habit_id, value, timestamp| {
            ActivityRecord::CountEntry {
                habit_id,
                value,
                timestamp,
            }
        })
    }

    pub fn weight_updates(&self) -> CoreResult<Vec<ActivityRecord>> {
        self.measurements("weight_updates", "weight", |habit_id, weight, timestamp| {
            ActivityRecord::WeightEntry {
                habit_id,
                weight,
                timestamp,
            }
        })
    }

    fn measurements(
        &self,
        table: &'static str,
        column: &'static str,
        build: impl Fn(HabitId, f64, DateTime<Utc>) -> ActivityRecord,
    ) -> CoreResult<Vec<ActivityRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT habit_id, {column}, created_at FROM {table} ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (habit_id, value, raw) = row?;
            records.push(build(HabitId(habit_id), value, parse_stamp(&raw)?));
        }
        Ok(records)
    }

    /// Delete parent-level checks for a habit inside `[start, end)`.
    pub fn delete_checks(&self, habit_id: HabitId, window: &DayWindow) -> CoreResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM checks
             WHERE habit_id = ?1 AND sub_habit_id IS NULL
               AND check_date >= ?2 AND check_date < ?3",
            params![
                habit_id.0,
                stamp(window.start.instant()),
                stamp(window.end.instant()),
            ],
        )?;
        Ok(removed)
    }

    // ── Rewards ─────────────────────────────────────────────────────────

    pub fn record_reward(&self, delta: i64, at: DateTime<Utc>) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO reward_events (delta, created_at) VALUES (?1, ?2)",
            params![delta, stamp(at)],
        )?;
        Ok(())
    }

    pub fn reward_balance(&self) -> CoreResult<i64> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(delta), 0) FROM reward_events",
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(total)
    }

    // ── Review journal ──────────────────────────────────────────────────

    pub fn append_review(&self, record: &ReviewRecord) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO review_log
                (review_date, resolution, scheduled, completed, penalty, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.date.to_string(),
                record.resolution.as_str(),
                record.scheduled as i64,
                record.completed as i64,
                record.penalty,
                record.recorded_at.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Most recent journal entries first.
    pub fn review_log(&self, limit: usize) -> CoreResult<Vec<ReviewRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT review_date, resolution, scheduled, completed, penalty, recorded_at
             FROM review_log
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (date, resolution, scheduled, completed, penalty, recorded_at) = row?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map_err(|e| CoreError::InvalidTimestamp(format!("{recorded_at}: {e}")))?;
            records.push(ReviewRecord {
                date: date.parse::<LogicalDate>()?,
                resolution: resolution
                    .parse::<Resolution>()
                    .map_err(|e| corrupt("review_log", e))?,
                scheduled: usize::try_from(scheduled).map_err(|e| corrupt("review_log", e))?,
                completed: usize::try_from(completed).map_err(|e| corrupt("review_log", e))?,
                penalty,
                recorded_at: WallClockMoment::new(recorded_at),
            });
        }
        Ok(records)
    }

    // ── Session ─────────────────────────────────────────────────────────

    pub fn session_state(&self) -> CoreResult<SessionState> {
        match self.kv_get(SESSION_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(SessionState::default()),
        }
    }

    /// Store a default session with `rollover` unless one exists.
    pub fn ensure_session(&self, rollover: RolloverHour) -> CoreResult<SessionState> {
        if self.kv_get(SESSION_KEY)?.is_some() {
            return self.session_state();
        }
        self.update_session(&SessionUpdate {
            rollover_hour: Some(rollover),
            ..SessionUpdate::default()
        })
    }

    /// Read-modify-write of the session JSON inside one transaction.
    pub fn update_session(&self, update: &SessionUpdate) -> CoreResult<SessionState> {
        let tx = self.conn.unchecked_transaction()?;
        let mut state = self.session_state()?;
        update.apply_to(&mut state);
        self.kv_set(SESSION_KEY, &serde_json::to_string(&state)?)?;
        tx.commit()?;
        Ok(state)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl HabitRepository for Database {
    async fn list(&self, include_deleted: bool) -> CoreResult<Vec<Habit>> {
        self.habits(include_deleted)
    }
}

#[async_trait(?Send)]
impl ActivityRepository for Database {
    async fn list_checks(&self) -> CoreResult<Vec<ActivityRecord>> {
        self.checks()
    }

    async fn list_counts(&self) -> CoreResult<Vec<ActivityRecord>> {
        self.counts()
    }

    async fn list_weight_updates(&self) -> CoreResult<Vec<ActivityRecord>> {
        self.weight_updates()
    }

    async fn record_check(&self, habit_id: HabitId, timestamp: DateTime<Utc>) -> CoreResult<()> {
        self.insert_activity(&ActivityRecord::check(habit_id, timestamp))
            .map(|_| ())
    }

    async fn remove_checks(&self, habit_id: HabitId, window: &DayWindow) -> CoreResult<usize> {
        self.delete_checks(habit_id, window)
    }
}

#[async_trait(?Send)]
impl RewardLedger for Database {
    async fn add(&self, amount: u32) -> CoreResult<()> {
        self.record_reward(i64::from(amount), Utc::now())
    }

    async fn subtract(&self, amount: u32) -> CoreResult<()> {
        self.record_reward(-i64::from(amount), Utc::now())
    }

    async fn balance(&self) -> CoreResult<i64> {
        self.reward_balance()
    }
}

#[async_trait(?Send)]
impl SessionStore for Database {
    async fn get(&self) -> CoreResult<SessionState> {
        self.session_state()
    }

    async fn update(&self, update: SessionUpdate) -> CoreResult<()> {
        self.update_session(&update).map(|_| ())
    }
}

#[async_trait(?Send)]
impl ReviewJournal for Database {
    async fn append(&self, record: &ReviewRecord) -> CoreResult<()> {
        self.append_review(record)
    }
}
