pub mod activity;
pub mod config;
pub mod day;
pub mod habit;
pub mod review;
pub mod rewards;
pub mod session;

use std::error::Error;
use std::future::Future;

use habitrail_core::{
    Config, Database, FixedClock, ObserverZone, SessionState, SystemClock, TimeProvider,
    WallClockMoment,
};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn Error>>;

/// Global flags shared by every subcommand.
pub struct Context {
    pub now: Option<String>,
    pub json: bool,
}

impl Context {
    /// The system clock, or a pinned one when `--now` is given.
    pub fn clock(&self) -> Result<Box<dyn TimeProvider>, Box<dyn Error>> {
        match &self.now {
            Some(raw) => {
                let moment = WallClockMoment::parse(raw, &ObserverZone::System)?;
                Ok(Box::new(FixedClock::new(moment)))
            }
            None => Ok(Box::new(SystemClock)),
        }
    }

    /// Print `value` as JSON with `--json`, otherwise the human rendering.
    pub fn print<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) -> CmdResult {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", human());
        }
        Ok(())
    }
}

/// Open the database, seeding a new session with the configured rollover hour.
pub fn open_store(config: &Config) -> Result<(Database, SessionState), Box<dyn Error>> {
    let db = Database::open()?;
    let session = db.ensure_session(config.default_rollover_hour())?;
    Ok((db, session))
}

/// Drive an engine future to completion on a single-threaded runtime.
pub fn block_on<F: Future>(fut: F) -> Result<F::Output, Box<dyn Error>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(fut))
}
