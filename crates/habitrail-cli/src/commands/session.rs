use clap::Subcommand;
use habitrail_core::{Config, RolloverHour, SessionLedger};

use super::{block_on, open_store, CmdResult, Context};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Print the stored session state
    Show,
    /// Change the hour at which a new logical day starts
    Rollover {
        /// Hour of day, 0-23
        hour: u8,
    },
}

pub fn run(ctx: &Context, action: SessionAction) -> CmdResult {
    let config = Config::load()?;
    let (db, session) = open_store(&config)?;

    match action {
        SessionAction::Show => ctx.print(&session, || {
            let last = session
                .last_session_date
                .map_or_else(|| "never".to_string(), |d| d.to_string());
            let pending = session
                .pending_review
                .map_or_else(|| "none".to_string(), |p| p.review_date.to_string());
            format!(
                "rollover hour: {:02}:00\nlast session:  {last}\npending review: {pending}",
                session.rollover_hour.get()
            )
        }),
        SessionAction::Rollover { hour } => {
            if hour > 23 {
                return Err(format!("rollover hour must be 0-23, got {hour}").into());
            }
            let hour = RolloverHour::new(i64::from(hour));
            block_on(SessionLedger::new(&db).set_rollover_hour(hour))??;
            println!("ok");
            Ok(())
        }
    }
}
