//! Review reconciler implementation.
//!
//! Methods take `&self`: the reconciler is driven from a single cooperative
//! thread where a second user action may start while a first one is
//! suspended on a remote call. Busy guards reject such duplicates, and
//! detection passes are tagged so a superseded pass never commits.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use super::catch_up::missed_days;
use super::{
    AdvanceOutcome, DayReview, DetectOutcome, FinalizeReport, Resolution, ReviewPhase,
    ReviewRecord, ReviewSnapshot, ToggleOutcome,
};
use crate::activity::{ActivityCoverageIndex, ActivityRecord};
use crate::clock::{LogicalClock, LogicalDate, ObserverZone, TimeProvider};
use crate::error::{CoreError, CoreResult};
use crate::habit::{Habit, HabitId, ScheduleEvaluator};
use crate::ports::{ActivityRepository, HabitRepository, ReviewJournal, RewardLedger, SessionStore};
use crate::session::{PendingReview, SessionLedger};

/// Tunables read from `[review]` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewOptions {
    /// How many missed days to walk before finalizing (1 = only the most
    /// recent day).
    pub catch_up_days: u32,
    /// Whether skipping also advances the session date.
    pub skip_advances_session: bool,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            catch_up_days: 1,
            skip_advances_session: false,
        }
    }
}

/// Data held while the user is deciding.
#[derive(Debug, Clone)]
struct ActiveReview {
    pending: PendingReview,
    last_session_date: Option<LogicalDate>,
    clock: LogicalClock,
    zone: ObserverZone,
    habits: BTreeMap<HabitId, Habit>,
    days: Vec<DayReview>,
    current: usize,
}

impl ActiveReview {
    fn current_day(&self) -> &DayReview {
        &self.days[self.current]
    }

    fn success_points(&self, id: HabitId) -> u32 {
        self.habits
            .get(&id)
            .map(|h| h.reward_settings.success_points)
            .unwrap_or(0)
    }

    fn day_penalty(&self, day: &DayReview) -> u32 {
        day.outstanding()
            .iter()
            .filter_map(|id| self.habits.get(id))
            .fold(0u32, |acc, h| acc.saturating_add(h.reward_settings.penalty_points))
    }

    /// Penalty for the current day and every later day not yet walked.
    fn outstanding_penalty(&self) -> u32 {
        self.days[self.current..]
            .iter()
            .fold(0u32, |acc, d| acc.saturating_add(self.day_penalty(d)))
    }
}

#[derive(Debug, Clone)]
enum ReviewState {
    Idle,
    Detecting,
    AwaitingDecision(Box<ActiveReview>),
    Finalizing,
}

impl ReviewState {
    fn phase(&self) -> ReviewPhase {
        match self {
            ReviewState::Idle => ReviewPhase::Idle,
            ReviewState::Detecting => ReviewPhase::Detecting,
            ReviewState::AwaitingDecision(_) => ReviewPhase::AwaitingDecision,
            ReviewState::Finalizing => ReviewPhase::Finalizing,
        }
    }
}

#[derive(Debug, Default)]
struct BusyGuards {
    applying: Cell<bool>,
    checking: Cell<bool>,
    updating: Cell<bool>,
}

/// Clears its flag on drop, including on early return.
struct BusyGuard<'g> {
    flag: &'g Cell<bool>,
}

impl<'g> BusyGuard<'g> {
    fn acquire(flag: &'g Cell<bool>, name: &'static str) -> CoreResult<Self> {
        if flag.replace(true) {
            return Err(CoreError::Busy(name));
        }
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Orchestrates detection, decision and finalization of daily reviews.
pub struct ReviewReconciler<'a> {
    habits: &'a dyn HabitRepository,
    activity: &'a dyn ActivityRepository,
    rewards: &'a dyn RewardLedger,
    session: SessionLedger<'a>,
    time: &'a dyn TimeProvider,
    journal: Option<&'a dyn ReviewJournal>,
    options: ReviewOptions,
    state: RefCell<ReviewState>,
    pass: Cell<u64>,
    guards: BusyGuards,
}

impl<'a> ReviewReconciler<'a> {
    pub fn new(
        habits: &'a dyn HabitRepository,
        activity: &'a dyn ActivityRepository,
        rewards: &'a dyn RewardLedger,
        session: &'a dyn SessionStore,
        time: &'a dyn TimeProvider,
    ) -> Self {
        Self {
            habits,
            activity,
            rewards,
            session: SessionLedger::new(session),
            time,
            journal: None,
            options: ReviewOptions::default(),
            state: RefCell::new(ReviewState::Idle),
            pass: Cell::new(0),
            guards: BusyGuards::default(),
        }
    }

    pub fn with_options(mut self, options: ReviewOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_journal(mut self, journal: &'a dyn ReviewJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> ReviewPhase {
        self.state.borrow().phase()
    }

    pub fn snapshot(&self) -> ReviewSnapshot {
        let state = self.state.borrow();
        match &*state {
            ReviewState::AwaitingDecision(review) => ReviewSnapshot {
                phase: ReviewPhase::AwaitingDecision,
                pending: Some(review.pending),
                days: review.days.clone(),
                current: review.current,
                outstanding_penalty: review.outstanding_penalty(),
            },
            other => ReviewSnapshot {
                phase: other.phase(),
                pending: None,
                days: Vec::new(),
                current: 0,
                outstanding_penalty: 0,
            },
        }
    }

    /// Look up a habit loaded for the active review.
    pub fn habit(&self, id: HabitId) -> Option<Habit> {
        match &*self.state.borrow() {
            ReviewState::AwaitingDecision(review) => review.habits.get(&id).cloned(),
            _ => None,
        }
    }

    // ── Detecting ────────────────────────────────────────────────────

    /// Detect whether a review is due and, if so, load it.
    ///
    /// An existing pending review is adopted unchanged. Otherwise a new one
    /// is created for the logical day before today when the session date
    /// differs from today.
    ///
    /// # Errors
    /// [`CoreError::SessionUnavailable`] when the session cannot be read; no
    /// pending review is fabricated in that case.
    pub async fn detect(&self) -> CoreResult<DetectOutcome> {
        if let ReviewState::Finalizing = &*self.state.borrow() {
            return Err(invalid_in(&ReviewState::Finalizing, "detect"));
        }
        let token = self.pass.get() + 1;
        self.pass.set(token);
        self.set_state(ReviewState::Detecting);
        debug!(token, "review: detection pass started");

        let loaded = self.session.load().await;
        if !self.is_current(token) {
            return Ok(DetectOutcome::Superseded);
        }
        let session = match loaded {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "review: session unavailable, staying idle");
                self.set_state(ReviewState::Idle);
                return Err(e);
            }
        };

        let clock = LogicalClock::new(session.rollover_hour);
        let zone = self.time.zone();
        let now = self.time.now();
        let today = clock.logical_date(&now);

        let (pending, outcome) = match session.pending_review {
            Some(pending) => (pending, DetectOutcome::Resumed { pending }),
            None => match session.last_session_date {
                None => {
                    if let Err(e) = self.session.advance_last_session_date(today).await {
                        warn!(error = %e, "review: could not record first session");
                    }
                    if !self.is_current(token) {
                        return Ok(DetectOutcome::Superseded);
                    }
                    self.set_state(ReviewState::Idle);
                    return Ok(DetectOutcome::FirstSession { today });
                }
                Some(last) if last == today => {
                    self.set_state(ReviewState::Idle);
                    return Ok(DetectOutcome::NoReviewDue { today });
                }
                Some(last) if last > today => {
                    warn!(%last, %today, "review: session date is ahead of today, not reviewing");
                    self.set_state(ReviewState::Idle);
                    return Ok(DetectOutcome::NoReviewDue { today });
                }
                Some(_) => {
                    let pending = PendingReview {
                        review_date: clock.previous_logical_day(today),
                        created_at: now,
                    };
                    if let Err(e) = self.session.set_pending_review(Some(pending)).await {
                        warn!(error = %e, "review: pending review not persisted");
                    }
                    if !self.is_current(token) {
                        return Ok(DetectOutcome::Superseded);
                    }
                    info!(review_date = %pending.review_date, "review: created pending review");
                    (pending, DetectOutcome::Created { pending })
                }
            },
        };

        let dates = missed_days(
            session.last_session_date,
            pending.review_date,
            self.options.catch_up_days,
        );
        let (habits, days) = self.load_days(&clock, &zone, &dates).await;
        if !self.is_current(token) {
            debug!(token, "review: detection pass superseded, discarding");
            return Ok(DetectOutcome::Superseded);
        }

        self.set_state(ReviewState::AwaitingDecision(Box::new(ActiveReview {
            pending,
            last_session_date: session.last_session_date,
            clock,
            zone,
            habits,
            days,
            current: 0,
        })));
        Ok(outcome)
    }

    /// Fetch habits and activity and build one [`DayReview`] per date.
    /// Read failures are recorded on each day rather than returned.
    async fn load_days(
        &self,
        clock: &LogicalClock,
        zone: &ObserverZone,
        dates: &[LogicalDate],
    ) -> (BTreeMap<HabitId, Habit>, Vec<DayReview>) {
        let (habits, checks, counts, weights) = tokio::join!(
            self.habits.list(false),
            self.activity.list_checks(),
            self.activity.list_counts(),
            self.activity.list_weight_updates(),
        );

        let mut errors = Vec::new();
        let habits = habits.unwrap_or_else(|e| {
            errors.push(e.to_string());
            Vec::new()
        });
        let mut records: Vec<ActivityRecord> = Vec::new();
        for fetched in [checks, counts, weights] {
            match fetched {
                Ok(mut batch) => records.append(&mut batch),
                Err(e) => errors.push(e.to_string()),
            }
        }

        let load_error = if errors.is_empty() {
            None
        } else {
            let joined = errors.join("; ");
            warn!(error = %joined, "review: could not load review data");
            Some(joined)
        };

        let index = ActivityCoverageIndex::build(&records, clock, zone);
        let days = dates
            .iter()
            .map(|&date| {
                let scheduled: BTreeSet<HabitId> = ScheduleEvaluator::scheduled_on(&habits, date)
                    .into_iter()
                    .map(|h| h.id)
                    .collect();
                let uncompleted = if load_error.is_some() {
                    // Partial data would over-report misses.
                    BTreeSet::new()
                } else {
                    let covered = index.covered_on(date, Some(&scheduled));
                    scheduled.difference(&covered).copied().collect()
                };
                DayReview {
                    date,
                    scheduled,
                    uncompleted,
                    completed: BTreeSet::new(),
                    load_error: load_error.clone(),
                }
            })
            .collect();

        let habits = habits
            .into_iter()
            .filter(|h| !h.is_deleted)
            .map(|h| (h.id, h))
            .collect();
        (habits, days)
    }

    // ── AwaitingDecision ─────────────────────────────────────────────

    /// Check or uncheck a missed habit for the day under review.
    ///
    /// Checking records a parent check at the day's logical timestamp and
    /// grants the habit's success points; unchecking reverses both.
    pub async fn toggle_habit(&self, habit_id: HabitId, completed: bool) -> CoreResult<ToggleOutcome> {
        let _guard = BusyGuard::acquire(&self.guards.checking, "checking")?;

        let (date, window, stamp, points, mode, already) = {
            let state = self.state.borrow();
            let review = match &*state {
                ReviewState::AwaitingDecision(review) => review,
                other => return Err(invalid_in(other, "toggle habit")),
            };
            let day = review.current_day();
            if !day.uncompleted.contains(&habit_id) {
                return Err(CoreError::NotUnderReview(habit_id.0));
            }
            (
                day.date,
                review.clock.day_window(day.date, &review.zone),
                review.clock.logical_timestamp(day.date, &review.zone),
                review.success_points(habit_id),
                day.mode(),
                day.completed.contains(&habit_id),
            )
        };
        if already == completed {
            return Ok(ToggleOutcome {
                habit_id,
                completed,
                mode,
                reward_error: None,
            });
        }

        let reward = if completed {
            self.activity
                .record_check(habit_id, stamp.instant())
                .await
                .map_err(|e| as_mutation("activity.record_check", e))?;
            self.reward_step(points, true).await
        } else {
            self.activity
                .remove_checks(habit_id, &window)
                .await
                .map_err(|e| as_mutation("activity.remove_checks", e))?;
            self.reward_step(points, false).await
        };
        let reward_error = reward.err().map(|e| {
            warn!(habit = %habit_id, error = %e, "review: reward update failed");
            e.to_string()
        });

        // The writes above have landed; a review replaced meanwhile by a
        // new detection pass rebuilds coverage from them.
        let mut state = self.state.borrow_mut();
        let ReviewState::AwaitingDecision(review) = &mut *state else {
            warn!(habit = %habit_id, "review: closed while toggle was in flight");
            return Ok(ToggleOutcome {
                habit_id,
                completed,
                mode,
                reward_error,
            });
        };
        let current = review.current;
        let day = &mut review.days[current];
        if day.date != date {
            warn!(habit = %habit_id, %date, "review: day changed while toggle was in flight");
            return Ok(ToggleOutcome {
                habit_id,
                completed,
                mode,
                reward_error,
            });
        }
        if completed {
            day.completed.insert(habit_id);
        } else {
            day.completed.remove(&habit_id);
        }
        debug!(habit = %habit_id, completed, date = %date, "review: toggled");
        Ok(ToggleOutcome {
            habit_id,
            completed,
            mode: day.mode(),
            reward_error,
        })
    }

    async fn reward_step(&self, points: u32, grant: bool) -> CoreResult<()> {
        if points == 0 {
            return Ok(());
        }
        if grant {
            self.rewards.add(points).await
        } else {
            self.rewards.subtract(points).await
        }
    }

    // ── Finalizing ───────────────────────────────────────────────────

    /// Advance past a perfect or fully completed day. On the last missed
    /// day this finalizes the review.
    ///
    /// # Errors
    /// [`CoreError::ReviewIncomplete`] while missed habits remain,
    /// [`CoreError::ReviewUnverified`] when the day's data failed to load,
    /// and [`CoreError::Busy`] while a toggle is in flight.
    pub async fn complete(&self) -> CoreResult<AdvanceOutcome> {
        let _guard = BusyGuard::acquire(&self.guards.updating, "updating")?;
        self.reject_while_checking()?;

        let review = {
            let mut state = self.state.borrow_mut();
            let review = match &mut *state {
                ReviewState::AwaitingDecision(review) => review,
                other => return Err(invalid_in(other, "complete review")),
            };
            let day = review.current_day();
            if let Some(reason) = &day.load_error {
                return Err(CoreError::ReviewUnverified {
                    date: day.date.to_string(),
                    reason: reason.clone(),
                });
            }
            if !day.is_complete() {
                return Err(CoreError::ReviewIncomplete {
                    date: day.date.to_string(),
                    outstanding: day.outstanding().len(),
                });
            }
            if review.current + 1 < review.days.len() {
                review.current += 1;
                let date = review.current_day().date;
                debug!(%date, "review: next missed day");
                return Ok(AdvanceOutcome::NextDay { date });
            }
            take_for_finalize(&mut state, "complete review")?
        };

        let resolution = if review.days.iter().all(DayReview::is_perfect) {
            Resolution::Perfect
        } else {
            Resolution::AllComplete
        };
        let report = self.finalize(review, resolution, 0, Vec::new()).await;
        Ok(AdvanceOutcome::Finalized { report })
    }

    /// Charge penalties for every missed habit still outstanding, then
    /// finalize.
    pub async fn apply_penalties(&self) -> CoreResult<FinalizeReport> {
        let _guard = BusyGuard::acquire(&self.guards.applying, "applying")?;
        self.reject_while_checking()?;

        let review = take_for_finalize(&mut self.state.borrow_mut(), "apply penalties")?;

        let penalty = review.outstanding_penalty();
        let mut failures = Vec::new();
        if penalty > 0 {
            if let Err(e) = self.rewards.subtract(penalty).await {
                warn!(penalty, error = %e, "review: penalty not charged");
                failures.push(as_mutation("reward.subtract", e).to_string());
            }
        }
        Ok(self
            .finalize(review, Resolution::PenaltiesApplied, penalty, failures)
            .await)
    }

    /// Close the review without a penalty. Unless configured otherwise the
    /// session date is left alone, so the next detection pass reviews the
    /// same gap again.
    pub async fn skip(&self) -> CoreResult<FinalizeReport> {
        let _guard = BusyGuard::acquire(&self.guards.updating, "updating")?;
        self.reject_while_checking()?;

        let review = take_for_finalize(&mut self.state.borrow_mut(), "skip review")?;

        if self.options.skip_advances_session {
            return Ok(self.finalize(review, Resolution::Skipped, 0, Vec::new()).await);
        }

        // Not journaled: the same days come back on the next detection.
        let mut failures = Vec::new();
        if let Err(e) = self.session.set_pending_review(None).await {
            warn!(error = %e, "review: pending review not cleared");
            failures.push(e.to_string());
        }
        self.set_state(ReviewState::Idle);
        info!(review_date = %review.pending.review_date, "review: skipped");
        Ok(FinalizeReport {
            resolution: Resolution::Skipped,
            review_date: review.pending.review_date,
            penalty: 0,
            advanced_to: None,
            failures,
        })
    }

    /// Shared exit: journal, then clear + advance as the last remote step.
    /// Never fails; remote errors land in the report.
    async fn finalize(
        &self,
        review: ActiveReview,
        resolution: Resolution,
        penalty: u32,
        mut failures: Vec<String>,
    ) -> FinalizeReport {
        // Real time may have moved on since detection.
        let today = review.clock.logical_date(&self.time.now());

        self.journal_days(&review, resolution, &mut failures).await;

        let advance = review.last_session_date.map_or(true, |last| today > last);
        let commit = if advance {
            self.session.finalize(today).await
        } else {
            warn!(%today, "review: not moving session date backwards");
            self.session.set_pending_review(None).await
        };
        if let Err(e) = commit {
            warn!(error = %e, "review: session not committed");
            failures.push(e.to_string());
        }

        self.set_state(ReviewState::Idle);
        info!(
            resolution = resolution.as_str(),
            review_date = %review.pending.review_date,
            penalty,
            failures = failures.len(),
            "review: finalized"
        );
        FinalizeReport {
            resolution,
            review_date: review.pending.review_date,
            penalty,
            advanced_to: advance.then_some(today),
            failures,
        }
    }

    async fn journal_days(
        &self,
        review: &ActiveReview,
        resolution: Resolution,
        failures: &mut Vec<String>,
    ) {
        let Some(journal) = self.journal else {
            return;
        };
        let recorded_at = self.time.now();
        for day in &review.days {
            let (resolution, completed) = if day.is_verified() {
                (
                    resolution,
                    day.scheduled.len().saturating_sub(day.outstanding().len()),
                )
            } else {
                (Resolution::Unverified, 0)
            };
            let record = ReviewRecord {
                date: day.date,
                resolution,
                scheduled: day.scheduled.len(),
                completed,
                penalty: if resolution == Resolution::PenaltiesApplied {
                    review.day_penalty(day)
                } else {
                    0
                },
                recorded_at,
            };
            if let Err(e) = journal.append(&record).await {
                warn!(date = %day.date, error = %e, "review: journal append failed");
                failures.push(as_mutation("journal.append", e).to_string());
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn set_state(&self, next: ReviewState) {
        *self.state.borrow_mut() = next;
    }

    /// Exits wait for an in-flight toggle to land.
    fn reject_while_checking(&self) -> CoreResult<()> {
        if self.guards.checking.get() {
            return Err(CoreError::Busy("checking"));
        }
        Ok(())
    }

    fn is_current(&self, token: u64) -> bool {
        self.pass.get() == token
    }
}

/// Move an awaiting review out of `state`, leaving `Finalizing` behind.
fn take_for_finalize(state: &mut ReviewState, action: &'static str) -> CoreResult<ActiveReview> {
    match std::mem::replace(state, ReviewState::Finalizing) {
        ReviewState::AwaitingDecision(review) => Ok(*review),
        other => {
            let err = invalid_in(&other, action);
            *state = other;
            Err(err)
        }
    }
}

fn invalid_in(state: &ReviewState, action: &'static str) -> CoreError {
    CoreError::InvalidTransition {
        action,
        state: state.phase().as_str().to_string(),
    }
}

fn as_mutation(operation: &'static str, err: CoreError) -> CoreError {
    match err {
        CoreError::RemoteMutationFailed { .. } => err,
        other => CoreError::mutation(operation, other),
    }
}
