//! Logical clock implementation.
//!
//! ```text
//!   local 02:59 on Jan 16  ->  logical Jan 15   (rollover 03)
//!   local 03:00 on Jan 16  ->  logical Jan 16
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, CoreResult};

/// Default hour at which a new logical day begins.
pub const DEFAULT_ROLLOVER_HOUR: u8 = 3;

/// Local hour (0-23) at which a new logical day begins.
///
/// Out-of-range input is clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct RolloverHour(u8);

impl RolloverHour {
    pub fn new(hour: i64) -> Self {
        Self(hour.clamp(0, 23) as u8)
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }

    fn start_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.get(), 0, 0).unwrap_or_default()
    }
}

impl Default for RolloverHour {
    fn default() -> Self {
        Self(DEFAULT_ROLLOVER_HOUR)
    }
}

impl From<i64> for RolloverHour {
    fn from(hour: i64) -> Self {
        Self::new(hour)
    }
}

impl From<RolloverHour> for u8 {
    fn from(hour: RolloverHour) -> Self {
        hour.0
    }
}

impl fmt::Display for RolloverHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

/// A calendar date after the rollover shift has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalDate(NaiveDate);

impl LogicalDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn naive(self) -> NaiveDate {
        self.0
    }

    /// 0 = Sunday .. 6 = Saturday.
    pub fn weekday_index(self) -> u8 {
        self.0.weekday().num_days_from_sunday() as u8
    }

    /// Like `from_str`, but a date-time carrying an offset is first
    /// localized into `zone`, so a UTC-serialized local midnight keeps its
    /// local date.
    pub fn parse_in(s: &str, zone: &ObserverZone) -> CoreResult<Self> {
        match DateTime::parse_from_rfc3339(s.trim()) {
            Ok(dt) => Ok(Self(zone.localize(dt.with_timezone(&Utc)).local_date())),
            Err(_) => s.parse(),
        }
    }

    pub fn pred(self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }

    pub fn succ(self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    /// Signed number of days from `self` to `later`.
    pub fn days_until(self, later: LogicalDate) -> i64 {
        (later.0 - self.0).num_days()
    }
}

impl From<NaiveDate> for LogicalDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for LogicalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for LogicalDate {
    type Err = CoreError;

    /// Accepts `YYYY-MM-DD` or an ISO-8601 date-time; for the latter the
    /// calendar date is taken as written. A UTC-serialized local midnight
    /// (e.g. `2024-01-14T15:00:00Z` for Jan 15 at UTC+9) therefore reads as
    /// the previous day; use [`LogicalDate::parse_in`] when the observer's
    /// zone is known.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self(date));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt.date_naive()));
        }
        parse_naive_datetime(s)
            .map(|dt| Self(dt.date()))
            .ok_or_else(|| CoreError::InvalidTimestamp(s.to_string()))
    }
}

impl Serialize for LogicalDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogicalDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An absolute instant together with the observer's local calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WallClockMoment(DateTime<FixedOffset>);

impl WallClockMoment {
    pub fn new(local: DateTime<FixedOffset>) -> Self {
        Self(local)
    }

    /// Parse an RFC 3339 timestamp, or a naive local date-time resolved in `zone`.
    pub fn parse(s: &str, zone: &ObserverZone) -> CoreResult<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt));
        }
        parse_naive_datetime(s)
            .map(|naive| zone.resolve_local(naive))
            .ok_or_else(|| CoreError::InvalidTimestamp(s.to_string()))
    }

    pub fn local_date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    pub fn local_hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }

    pub fn offset(&self) -> FixedOffset {
        *self.0.offset()
    }

    pub fn as_datetime(&self) -> DateTime<FixedOffset> {
        self.0
    }

    pub fn plus(&self, delta: Duration) -> Self {
        Self(self.0 + delta)
    }
}

impl fmt::Display for WallClockMoment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// The timezone whose local fields the observer sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverZone {
    /// The operating system's local timezone (DST-aware).
    System,
    Fixed(FixedOffset),
}

impl ObserverZone {
    pub fn utc() -> Self {
        ObserverZone::Fixed(Utc.fix())
    }

    /// View an absolute instant through this zone's local fields.
    pub fn localize(&self, instant: DateTime<Utc>) -> WallClockMoment {
        match self {
            ObserverZone::System => WallClockMoment(instant.with_timezone(&Local).fixed_offset()),
            ObserverZone::Fixed(offset) => WallClockMoment(instant.with_timezone(offset)),
        }
    }

    /// Resolve local calendar fields to a moment. Ambiguous times take the
    /// earlier instant; times inside a DST gap move forward past the gap.
    pub fn resolve_local(&self, naive: NaiveDateTime) -> WallClockMoment {
        match self {
            ObserverZone::System => WallClockMoment(resolve_in(&Local, naive)),
            ObserverZone::Fixed(offset) => WallClockMoment(resolve_in(offset, naive)),
        }
    }
}

fn resolve_in<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<FixedOffset> {
    let mut probe = naive;
    for _ in 0..8 {
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return dt.fixed_offset();
        }
        probe += Duration::minutes(30);
    }
    tz.from_utc_datetime(&naive).fixed_offset()
}

/// Half-open interval `[start, end)` covered by one logical day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    pub start: WallClockMoment,
    pub end: WallClockMoment,
}

impl DayWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.instant() <= instant && instant < self.end.instant()
    }
}

/// Maps wall-clock moments to logical dates for one fixed rollover hour.
///
/// Build one clock per reconciliation pass so every comparison inside the
/// pass uses the same rollover hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalClock {
    rollover: RolloverHour,
}

impl LogicalClock {
    pub fn new(rollover: RolloverHour) -> Self {
        Self { rollover }
    }

    pub fn rollover_hour(&self) -> RolloverHour {
        self.rollover
    }

    pub fn logical_date(&self, moment: &WallClockMoment) -> LogicalDate {
        let date = LogicalDate(moment.local_date());
        if moment.local_hour() < self.rollover.get() {
            date.pred()
        } else {
            date
        }
    }

    /// The window starts at the rollover hour on `date` and ends where the
    /// next logical day starts, so it always agrees with [`Self::logical_date`].
    pub fn day_window(&self, date: LogicalDate, zone: &ObserverZone) -> DayWindow {
        DayWindow {
            start: self.day_start(date, zone),
            end: self.day_start(date.succ(), zone),
        }
    }

    pub fn is_on_logical_day(&self, timestamp: &WallClockMoment, reference: &WallClockMoment) -> bool {
        self.logical_date(timestamp) == self.logical_date(reference)
    }

    pub fn previous_logical_day(&self, date: LogicalDate) -> LogicalDate {
        date.pred()
    }

    /// A local noon inside the logical day, used when recording activity
    /// for a past day. With a rollover after noon that is the next
    /// calendar day's noon.
    pub fn logical_timestamp(&self, date: LogicalDate, zone: &ObserverZone) -> WallClockMoment {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default();
        let calendar = if self.rollover.get() > 12 { date.succ() } else { date };
        zone.resolve_local(calendar.naive().and_time(noon))
    }

    fn day_start(&self, date: LogicalDate, zone: &ObserverZone) -> WallClockMoment {
        zone.resolve_local(date.naive().and_time(self.rollover.start_time()))
    }
}
