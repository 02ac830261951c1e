//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default day rollover hour for new sessions
//! - Review behavior (catch-up window, skip semantics)
//! - Reward unit display
//! - Log level
//!
//! Configuration is stored at `~/.config/habitrail/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::clock::RolloverHour;
use crate::error::{ConfigError, CoreResult};
use crate::review::ReviewOptions;

/// Logical-day settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayConfig {
    /// Rollover hour used when a session has never stored one.
    #[serde(default = "default_rollover_hour")]
    pub default_rollover_hour: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_catch_up_days")]
    pub catch_up_days: u32,
    #[serde(default)]
    pub skip_advances_session: bool,
}

/// Where the reward unit goes relative to the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitPosition {
    #[default]
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub unit_position: UnitPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive, overridden by `HABITRAIL_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub day: DayConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_rollover_hour() -> u8 {
    3
}
fn default_catch_up_days() -> u32 {
    1
}
fn default_unit() -> String {
    "$".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for DayConfig {
    fn default() -> Self {
        Self {
            default_rollover_hour: default_rollover_hour(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            catch_up_days: default_catch_up_days(),
            skip_advances_session: false,
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            unit_position: UnitPosition::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let unknown = || ConfigError::UnknownKey(key.to_string());

        if key.is_empty() {
            return Err(unknown());
        }
        let mut parts = key.split('.').peekable();

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> CoreResult<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> CoreResult<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> CoreResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> CoreResult<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> CoreResult<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit
    /// the field.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Update a value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> CoreResult<()> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Every dot-path key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.day.default_rollover_hour > 23 {
            return Err(ConfigError::InvalidValue {
                key: "day.default_rollover_hour".into(),
                message: format!("{} is not an hour of the day", self.day.default_rollover_hour),
            });
        }
        if self.review.catch_up_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "review.catch_up_days".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn default_rollover_hour(&self) -> RolloverHour {
        RolloverHour::new(i64::from(self.day.default_rollover_hour))
    }

    pub fn review_options(&self) -> ReviewOptions {
        ReviewOptions {
            catch_up_days: self.review.catch_up_days,
            skip_advances_session: self.review.skip_advances_session,
        }
    }

    /// Render a point balance with the configured unit.
    pub fn format_points(&self, points: i64) -> String {
        let unit = &self.rewards.unit;
        match self.rewards.unit_position {
            UnitPosition::Before if points < 0 => format!("-{unit}{}", points.unsigned_abs()),
            UnitPosition::Before => format!("{unit}{points}"),
            UnitPosition::After => format!("{points} {unit}"),
        }
    }
}
