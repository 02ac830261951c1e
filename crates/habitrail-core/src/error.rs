//! Core error types for habitrail-core.
//!
//! This module defines the error hierarchy using thiserror. The review
//! engine distinguishes local programmer errors (`InvalidTimestamp`), an
//! unreadable session (`SessionUnavailable`) and failed remote writes
//! (`RemoteMutationFailed`); everything else wraps the storage layers.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for habitrail-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A timestamp could not be parsed into a wall-clock moment.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Session state could not be loaded.
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    /// A reward or session-persistence write failed.
    #[error("Remote mutation '{operation}' failed: {message}")]
    RemoteMutationFailed { operation: String, message: String },

    /// Habit or activity fetch failed.
    #[error("Remote read '{operation}' failed: {message}")]
    RemoteReadFailed { operation: String, message: String },

    /// The same mutating action is already in flight.
    #[error("Operation already in progress: {0}")]
    Busy(&'static str),

    /// Action not permitted in the current review state.
    #[error("Cannot {action} while review is {state}")]
    InvalidTransition { action: &'static str, state: String },

    /// The habit is not on the current day's review list.
    #[error("Habit {0} is not under review for this day")]
    NotUnderReview(i64),

    /// The current day still has outstanding habits.
    #[error("Review for {date} still has {outstanding} outstanding habit(s)")]
    ReviewIncomplete { date: String, outstanding: usize },

    /// The day's review data failed to load; it can be skipped, not completed.
    #[error("Review for {date} could not be loaded: {reason}")]
    ReviewUnverified { date: String, reason: String },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn mutation(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CoreError::RemoteMutationFailed {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    pub fn read(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CoreError::RemoteReadFailed {
            operation: operation.into(),
            message: err.to_string(),
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded
    #[error("Corrupt row in '{table}': {message}")]
    CorruptRow { table: &'static str, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not determine or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::QueryFailed(err))
    }
}

/// Result alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_error_names_operation() {
        let err = CoreError::mutation("reward.subtract", "connection reset");
        assert_eq!(
            err.to_string(),
            "Remote mutation 'reward.subtract' failed: connection reset"
        );
    }

    #[test]
    fn rusqlite_error_converts_to_database() {
        let err: CoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::QueryFailed(_))
        ));
    }

    #[test]
    fn config_error_converts() {
        let err: CoreError = ConfigError::UnknownKey("day.nope".into()).into();
        assert!(err.to_string().contains("day.nope"));
    }
}
