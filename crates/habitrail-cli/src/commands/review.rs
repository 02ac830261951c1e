use clap::Subcommand;
use habitrail_core::{
    AdvanceOutcome, Config, Database, DayReview, DetectOutcome, FinalizeReport, HabitId,
    ReviewPhase, ReviewReconciler, ReviewSnapshot,
};

use super::{block_on, open_store, CmdResult, Context};

#[derive(Subcommand)]
pub enum ReviewAction {
    /// Show the day under review
    Status,
    /// Check whether a review is due, creating one if needed
    Detect,
    /// Mark missed habits as done for the day under review
    Check {
        /// Habit IDs
        #[arg(required = true)]
        habit_ids: Vec<i64>,
    },
    /// Move past a perfect or fully completed day
    Advance,
    /// Charge penalties for outstanding habits and close the review
    Apply,
    /// Close the review without a penalty
    Skip,
    /// Show resolved review days, newest first
    Log {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(ctx: &Context, action: ReviewAction) -> CmdResult {
    let config = Config::load()?;
    let (db, _) = open_store(&config)?;
    let time = ctx.clock()?;
    let reconciler = ReviewReconciler::new(&db, &db, &db, &db, &*time)
        .with_options(config.review_options())
        .with_journal(&db);

    block_on(execute(ctx, &config, &db, &reconciler, action))?
}

async fn execute(
    ctx: &Context,
    config: &Config,
    db: &Database,
    reconciler: &ReviewReconciler<'_>,
    action: ReviewAction,
) -> CmdResult {
    match action {
        ReviewAction::Log { limit } => {
            let log = db.review_log(limit)?;
            ctx.print(&log, || {
                log.iter()
                    .map(|r| {
                        format!(
                            "{}  {:<17} {}/{} done  penalty {}",
                            r.date,
                            r.resolution.as_str(),
                            r.completed,
                            r.scheduled,
                            config.format_points(i64::from(r.penalty))
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        ReviewAction::Detect => {
            let outcome = reconciler.detect().await?;
            ctx.print(&outcome, || describe_detect(&outcome))
        }
        ReviewAction::Status => {
            reconciler.detect().await?;
            fast_forward(reconciler).await?;
            let snapshot = reconciler.snapshot();
            ctx.print(&snapshot, || render_snapshot(reconciler, config, &snapshot))
        }
        ReviewAction::Check { habit_ids } => {
            open_review(reconciler).await?;
            let mut outcomes = Vec::with_capacity(habit_ids.len());
            for id in habit_ids {
                outcomes.push(reconciler.toggle_habit(HabitId(id), true).await?);
            }
            ctx.print(&outcomes, || {
                outcomes
                    .iter()
                    .map(|o| {
                        let mut line = format!("checked {}", label(reconciler, o.habit_id));
                        if let Some(err) = &o.reward_error {
                            line.push_str(&format!("\nwarning: reward not granted: {err}"));
                        }
                        line
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        ReviewAction::Advance => {
            open_review(reconciler).await?;
            let outcome = reconciler.complete().await?;
            ctx.print(&outcome, || match &outcome {
                AdvanceOutcome::NextDay { date } => format!("next missed day: {date}"),
                AdvanceOutcome::Finalized { report } => describe_report(config, report),
            })
        }
        ReviewAction::Apply => {
            open_review(reconciler).await?;
            let report = reconciler.apply_penalties().await?;
            ctx.print(&report, || describe_report(config, &report))
        }
        ReviewAction::Skip => {
            open_review(reconciler).await?;
            let report = reconciler.skip().await?;
            ctx.print(&report, || describe_report(config, &report))
        }
    }
}

/// Load the pending review and move to the first day needing a decision.
async fn open_review(reconciler: &ReviewReconciler<'_>) -> CmdResult {
    reconciler.detect().await?;
    if reconciler.phase() != ReviewPhase::AwaitingDecision {
        return Err("no review is pending".into());
    }
    fast_forward(reconciler).await
}

/// Each run rebuilds the review from stored activity, so days completed in
/// earlier runs come back complete and are walked past here.
async fn fast_forward(reconciler: &ReviewReconciler<'_>) -> CmdResult {
    loop {
        let snapshot = reconciler.snapshot();
        match snapshot.current_day() {
            Some(day) if day.is_complete() && !snapshot.is_last_day() => {
                reconciler.complete().await?;
            }
            _ => return Ok(()),
        }
    }
}

fn label(reconciler: &ReviewReconciler<'_>, id: HabitId) -> String {
    match reconciler.habit(id) {
        Some(habit) => format!("{id} {}", habit.name),
        None => id.to_string(),
    }
}

fn describe_detect(outcome: &DetectOutcome) -> String {
    match outcome {
        DetectOutcome::FirstSession { today } => format!("first session, starting on {today}"),
        DetectOutcome::NoReviewDue { today } => format!("no review due ({today})"),
        DetectOutcome::Resumed { pending } => {
            format!("review pending for {}", pending.review_date)
        }
        DetectOutcome::Created { pending } => {
            format!("review created for {}", pending.review_date)
        }
        DetectOutcome::Superseded => "detection superseded".to_string(),
    }
}

fn render_day(reconciler: &ReviewReconciler<'_>, day: &DayReview) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(err) = &day.load_error {
        lines.push(format!("  warning: activity could not be loaded: {err}"));
    }
    for id in &day.scheduled {
        let mark = if !day.uncompleted.contains(id) {
            "done"
        } else if day.completed.contains(id) {
            "checked"
        } else {
            "missed"
        };
        let penalty = reconciler
            .habit(*id)
            .map(|h| h.reward_settings.penalty_points)
            .unwrap_or(0);
        let mut line = format!("  [{mark:^7}] {}", label(reconciler, *id));
        if mark == "missed" && penalty > 0 {
            line.push_str(&format!(" (-{penalty})"));
        }
        lines.push(line);
    }
    lines
}

fn render_snapshot(
    reconciler: &ReviewReconciler<'_>,
    config: &Config,
    snapshot: &ReviewSnapshot,
) -> String {
    let Some(day) = snapshot.current_day() else {
        return "no review pending".to_string();
    };
    let mut lines = vec![format!(
        "reviewing {} (day {} of {})",
        day.date,
        snapshot.current + 1,
        snapshot.days.len()
    )];
    lines.extend(render_day(reconciler, day));
    if !day.is_verified() {
        lines.push("this day cannot be judged, run `habitrail review skip`".to_string());
    } else if day.is_perfect() {
        lines.push("perfect day! run `habitrail review advance`".to_string());
    } else if day.is_complete() {
        lines.push("all caught up, run `habitrail review advance`".to_string());
    } else {
        lines.push(format!(
            "outstanding penalty: {}",
            config.format_points(i64::from(snapshot.outstanding_penalty))
        ));
    }
    lines.join("\n")
}

fn describe_report(config: &Config, report: &FinalizeReport) -> String {
    let mut lines = vec![format!(
        "review for {} closed: {}",
        report.review_date,
        report.resolution.as_str()
    )];
    if report.penalty > 0 {
        lines.push(format!(
            "penalty charged: {}",
            config.format_points(i64::from(report.penalty))
        ));
    }
    match report.advanced_to {
        Some(date) => lines.push(format!("session date: {date}")),
        None => lines.push("session date unchanged".to_string()),
    }
    for failure in &report.failures {
        lines.push(format!("warning: {failure}"));
    }
    lines.join("\n")
}
