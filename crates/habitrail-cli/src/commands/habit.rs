use std::path::PathBuf;

use clap::Subcommand;
use habitrail_core::{Config, Habit};

use super::{open_store, CmdResult, Context};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Import habit definitions from a JSON array, replacing matching IDs
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// List habits
    List {
        /// Include deleted habits
        #[arg(long)]
        all: bool,
    },
}

pub fn run(ctx: &Context, action: HabitAction) -> CmdResult {
    let config = Config::load()?;
    let (db, _) = open_store(&config)?;

    match action {
        HabitAction::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let habits: Vec<Habit> = serde_json::from_str(&content)?;
            for habit in &habits {
                db.upsert_habit(habit)?;
            }
            println!("imported {} habit(s)", habits.len());
            Ok(())
        }
        HabitAction::List { all } => {
            let habits = db.habits(all)?;
            ctx.print(&habits, || {
                habits
                    .iter()
                    .map(|h| {
                        let days: Vec<String> =
                            h.schedule.weekdays.indices().iter().map(u8::to_string).collect();
                        format!(
                            "{:>4}  {:<20} {:<6} days [{}]  +{} / -{}{}",
                            h.id.0,
                            h.name,
                            h.kind.as_str(),
                            days.join(","),
                            h.reward_settings.success_points,
                            h.reward_settings.penalty_points,
                            if h.is_deleted { "  (deleted)" } else { "" }
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}
