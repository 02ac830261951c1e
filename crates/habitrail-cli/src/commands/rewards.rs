use clap::Subcommand;
use habitrail_core::Config;
use serde::Serialize;

use super::{open_store, CmdResult, Context};

#[derive(Subcommand)]
pub enum RewardsAction {
    /// Print the current point balance
    Balance,
}

#[derive(Serialize)]
struct BalanceView {
    balance: i64,
    display: String,
}

pub fn run(ctx: &Context, action: RewardsAction) -> CmdResult {
    let config = Config::load()?;
    let (db, _) = open_store(&config)?;

    match action {
        RewardsAction::Balance => {
            let balance = db.reward_balance()?;
            let view = BalanceView {
                balance,
                display: config.format_points(balance),
            };
            ctx.print(&view, || view.display.clone())
        }
    }
}
