use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "habitrail", version, about = "Habitrail habit tracker CLI")]
struct Cli {
    /// Pretend the current time is this moment (RFC 3339 or "YYYY-MM-DD HH:MM")
    #[arg(long, global = true)]
    now: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the logical day for a moment
    Day {
        /// Moment to inspect (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Session state
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Daily review of missed days
    Review {
        #[command(subcommand)]
        action: commands::review::ReviewAction,
    },
    /// Habit definitions
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Record and list activity
    Activity {
        #[command(subcommand)]
        action: commands::activity::ActivityAction,
    },
    /// Reward balance
    Rewards {
        #[command(subcommand)]
        action: commands::rewards::RewardsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging() {
    let fallback = habitrail_core::Config::load()
        .map(|c| c.log.level)
        .unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_from_env("HABITRAIL_LOG")
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let ctx = commands::Context {
        now: cli.now,
        json: cli.json,
    };
    let result = match cli.command {
        Commands::Day { at } => commands::day::run(&ctx, at),
        Commands::Session { action } => commands::session::run(&ctx, action),
        Commands::Review { action } => commands::review::run(&ctx, action),
        Commands::Habit { action } => commands::habit::run(&ctx, action),
        Commands::Activity { action } => commands::activity::run(&ctx, action),
        Commands::Rewards { action } => commands::rewards::run(&ctx, action),
        Commands::Config { action } => commands::config::run(&ctx, action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
