//! Weekday schedules.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Habit;
use crate::clock::LogicalDate;

/// Set of weekdays, 0 = Sunday .. 6 = Saturday.
///
/// Serialized as a sorted list of indices. An empty or missing list means
/// every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const ALL: WeekdaySet = WeekdaySet(0b0111_1111);

    /// Build from weekday indices; indices above 6 are ignored.
    pub fn from_indices<I: IntoIterator<Item = u8>>(days: I) -> Self {
        let bits = days
            .into_iter()
            .filter(|d| *d < 7)
            .fold(0u8, |acc, d| acc | (1 << d));
        if bits == 0 {
            Self::ALL
        } else {
            Self(bits)
        }
    }

    pub fn contains(&self, weekday: u8) -> bool {
        weekday < 7 && self.0 & (1 << weekday) != 0
    }

    pub fn indices(&self) -> Vec<u8> {
        (0..7).filter(|d| self.contains(*d)).collect()
    }
}

impl Default for WeekdaySet {
    fn default() -> Self {
        Self::ALL
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.indices().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WeekdaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let days = Vec::<u8>::deserialize(deserializer)?;
        if let Some(bad) = days.iter().find(|d| **d > 6) {
            return Err(serde::de::Error::custom(format!(
                "weekday index {bad} out of range 0..=6"
            )));
        }
        Ok(Self::from_indices(days))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HabitScheduleSettings {
    #[serde(default)]
    pub weekdays: WeekdaySet,
}

/// Decides whether a habit was expected on a logical date.
pub struct ScheduleEvaluator;

impl ScheduleEvaluator {
    /// Evaluated against the day's weekday, never against record times.
    pub fn is_scheduled(habit: &Habit, date: LogicalDate) -> bool {
        habit.schedule.weekdays.contains(date.weekday_index())
    }

    /// Live (not soft-deleted) habits scheduled on `date`.
    pub fn scheduled_on<'h>(habits: &'h [Habit], date: LogicalDate) -> Vec<&'h Habit> {
        habits
            .iter()
            .filter(|h| !h.is_deleted && Self::is_scheduled(h, date))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week_from(start: &str) -> Vec<LogicalDate> {
        let mut day: LogicalDate = start.parse().unwrap();
        (0..7)
            .map(|_| {
                let current = day;
                day = day.succ();
                current
            })
            .collect()
    }

    #[test]
    fn default_schedule_covers_every_weekday() {
        let habit = Habit::new(1, "Stretch");
        let week = week_from("2024-01-14");
        let mut seen: Vec<u8> = week.iter().map(|d| d.weekday_index()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 6]);
        assert!(week.iter().all(|d| ScheduleEvaluator::is_scheduled(&habit, *d)));
    }

    #[test]
    fn weekday_subset() {
        // Mon, Wed, Fri
        let habit = Habit::new(2, "Gym").with_weekdays(WeekdaySet::from_indices([1, 3, 5]));
        let scheduled: Vec<u8> = week_from("2024-01-14")
            .into_iter()
            .filter(|d| ScheduleEvaluator::is_scheduled(&habit, *d))
            .map(|d| d.weekday_index())
            .collect();
        assert_eq!(scheduled, vec![1, 3, 5]);
    }

    #[test]
    fn empty_list_means_every_day() {
        let set: WeekdaySet = serde_json::from_str("[]").unwrap();
        assert_eq!(set, WeekdaySet::ALL);
    }

    #[test]
    fn out_of_range_weekday_rejected() {
        assert!(serde_json::from_str::<WeekdaySet>("[1, 7]").is_err());
    }

    #[test]
    fn scheduled_on_skips_deleted() {
        let habits = vec![Habit::new(1, "A"), Habit::new(2, "B").deleted()];
        let date: LogicalDate = "2024-01-15".parse().unwrap();
        let ids: Vec<i64> = ScheduleEvaluator::scheduled_on(&habits, date)
            .iter()
            .map(|h| h.id.0)
            .collect();
        assert_eq!(ids, vec![1]);
    }
}
