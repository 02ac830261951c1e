//! On-disk persistence: TOML config and the SQLite store.

mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, DayConfig, LogConfig, ReviewConfig, RewardsConfig, UnitPosition};
pub use database::Database;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `HABITRAIL_HOME` wins when set. Otherwise `~/.config/habitrail/`, or
/// `~/.config/habitrail-dev/` when `HABITRAIL_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("HABITRAIL_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("HABITRAIL_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("habitrail-dev")
            } else {
                base_dir.join("habitrail")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
