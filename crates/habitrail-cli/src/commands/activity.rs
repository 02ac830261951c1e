use std::error::Error;

use clap::Subcommand;
use habitrail_core::{
    ActivityRecord, Config, Database, HabitId, LogicalClock, LogicalDate, TimeProvider,
    WallClockMoment,
};

use super::{open_store, CmdResult, Context};

#[derive(Subcommand)]
pub enum ActivityAction {
    /// Check off a habit
    Check {
        habit_id: i64,
        /// When it happened (defaults to now)
        #[arg(long)]
        at: Option<String>,
        /// Check a sub-habit instead of the habit itself
        #[arg(long)]
        sub: Option<i64>,
    },
    /// Log a count entry
    Count {
        habit_id: i64,
        value: f64,
        #[arg(long)]
        at: Option<String>,
    },
    /// Log a weight update
    Weight {
        habit_id: i64,
        weight: f64,
        #[arg(long)]
        at: Option<String>,
    },
    /// List recorded activity
    List {
        /// Only records on this logical date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
}

fn resolve_at(
    time: &dyn TimeProvider,
    at: Option<String>,
) -> Result<WallClockMoment, Box<dyn Error>> {
    match at {
        Some(raw) => Ok(WallClockMoment::parse(&raw, &time.zone())?),
        None => Ok(time.now()),
    }
}

/// Grant a habit's success points for a parent-level check.
fn grant_success(db: &Database, habit_id: HabitId, at: &WallClockMoment) -> Result<u32, Box<dyn Error>> {
    let points = db
        .habits(false)?
        .into_iter()
        .find(|h| h.id == habit_id)
        .map(|h| h.reward_settings.success_points)
        .unwrap_or(0);
    if points > 0 {
        db.record_reward(i64::from(points), at.instant())?;
    }
    Ok(points)
}

pub fn run(ctx: &Context, action: ActivityAction) -> CmdResult {
    let config = Config::load()?;
    let (db, session) = open_store(&config)?;
    let time = ctx.clock()?;

    match action {
        ActivityAction::Check { habit_id, at, sub } => {
            let at = resolve_at(&*time, at)?;
            let habit_id = HabitId(habit_id);
            let record = match sub {
                Some(sub_id) => ActivityRecord::sub_check(habit_id, sub_id, at.instant()),
                None => ActivityRecord::check(habit_id, at.instant()),
            };
            db.insert_activity(&record)?;
            let points = if sub.is_none() {
                grant_success(&db, habit_id, &at)?
            } else {
                0
            };
            ctx.print(&record, || {
                if points > 0 {
                    format!("checked habit {habit_id} (+{points})")
                } else {
                    format!("checked habit {habit_id}")
                }
            })
        }
        ActivityAction::Count { habit_id, value, at } => {
            let at = resolve_at(&*time, at)?;
            let record = ActivityRecord::count(HabitId(habit_id), value, at.instant());
            db.insert_activity(&record)?;
            ctx.print(&record, || format!("logged {value} for habit {habit_id}"))
        }
        ActivityAction::Weight { habit_id, weight, at } => {
            let at = resolve_at(&*time, at)?;
            let record = ActivityRecord::weight(HabitId(habit_id), weight, at.instant());
            db.insert_activity(&record)?;
            ctx.print(&record, || format!("logged weight {weight} for habit {habit_id}"))
        }
        ActivityAction::List { date } => {
            let mut records = db.checks()?;
            records.extend(db.counts()?);
            records.extend(db.weight_updates()?);
            records.sort_by_key(ActivityRecord::timestamp);

            let zone = time.zone();
            let clock = LogicalClock::new(session.rollover_hour);
            if let Some(raw) = date {
                let wanted = LogicalDate::parse_in(&raw, &zone)?;
                records.retain(|r| clock.logical_date(&zone.localize(r.timestamp())) == wanted);
            }

            ctx.print(&records, || {
                records
                    .iter()
                    .map(|r| {
                        let local = zone.localize(r.timestamp());
                        let detail = match r {
                            ActivityRecord::Check {
                                sub_habit_id: Some(sub),
                                ..
                            } => format!("check (sub-habit {sub})"),
                            ActivityRecord::Check { checked: false, .. } => {
                                "check (unchecked)".to_string()
                            }
                            ActivityRecord::Check { .. } => "check".to_string(),
                            ActivityRecord::CountEntry { value, .. } => format!("count {value}"),
                            ActivityRecord::WeightEntry { weight, .. } => format!("weight {weight}"),
                        };
                        format!(
                            "{}  {}  habit {}  {}",
                            clock.logical_date(&local),
                            local,
                            r.habit_id(),
                            detail
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}
