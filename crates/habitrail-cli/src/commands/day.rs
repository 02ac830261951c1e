use habitrail_core::{Config, DayWindow, LogicalClock, LogicalDate, RolloverHour, WallClockMoment};
use serde::Serialize;

use super::{open_store, CmdResult, Context};

#[derive(Serialize)]
struct DayView {
    moment: WallClockMoment,
    logical_date: LogicalDate,
    rollover_hour: RolloverHour,
    window: DayWindow,
}

pub fn run(ctx: &Context, at: Option<String>) -> CmdResult {
    let config = Config::load()?;
    let (_db, session) = open_store(&config)?;
    let time = ctx.clock()?;
    let zone = time.zone();

    let moment = match at {
        Some(raw) => WallClockMoment::parse(&raw, &zone)?,
        None => time.now(),
    };
    let clock = LogicalClock::new(session.rollover_hour);
    let logical_date = clock.logical_date(&moment);
    let view = DayView {
        moment,
        logical_date,
        rollover_hour: session.rollover_hour,
        window: clock.day_window(logical_date, &zone),
    };

    ctx.print(&view, || {
        format!(
            "{} (rollover {:02}:00, {} .. {})",
            view.logical_date,
            view.rollover_hour.get(),
            view.window.start,
            view.window.end
        )
    })
}
