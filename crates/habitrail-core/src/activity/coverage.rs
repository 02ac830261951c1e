//! Which habits were tracked on a logical day.

use std::collections::{BTreeMap, BTreeSet};

use super::ActivityRecord;
use crate::clock::{LogicalClock, LogicalDate, ObserverZone};
use crate::habit::HabitId;

/// Habits covered on `target`.
///
/// The reference point is local noon of the target date so the rollover
/// hour itself can never make the reference ambiguous. When `allow` is
/// given, only habits in it are considered.
pub fn covered_habit_ids(
    records: &[ActivityRecord],
    clock: &LogicalClock,
    zone: &ObserverZone,
    target: LogicalDate,
    allow: Option<&BTreeSet<HabitId>>,
) -> BTreeSet<HabitId> {
    let reference = clock.logical_timestamp(target, zone);
    records
        .iter()
        .filter(|r| r.counts_for_parent())
        .filter(|r| allow.map_or(true, |ids| ids.contains(&r.habit_id())))
        .filter(|r| clock.is_on_logical_day(&zone.localize(r.timestamp()), &reference))
        .map(ActivityRecord::habit_id)
        .collect()
}

/// Coverage bucketed by logical date, for reviewing several days at once.
#[derive(Debug, Clone, Default)]
pub struct ActivityCoverageIndex {
    by_day: BTreeMap<LogicalDate, BTreeSet<HabitId>>,
}

impl ActivityCoverageIndex {
    pub fn build(records: &[ActivityRecord], clock: &LogicalClock, zone: &ObserverZone) -> Self {
        let mut by_day: BTreeMap<LogicalDate, BTreeSet<HabitId>> = BTreeMap::new();
        for record in records.iter().filter(|r| r.counts_for_parent()) {
            let day = clock.logical_date(&zone.localize(record.timestamp()));
            by_day.entry(day).or_default().insert(record.habit_id());
        }
        Self { by_day }
    }

    pub fn covered_on(
        &self,
        date: LogicalDate,
        allow: Option<&BTreeSet<HabitId>>,
    ) -> BTreeSet<HabitId> {
        self.by_day
            .get(&date)
            .map(|ids| {
                ids.iter()
                    .filter(|id| allow.map_or(true, |a| a.contains(id)))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_covered(&self, date: LogicalDate, habit: HabitId) -> bool {
        self.by_day.get(&date).is_some_and(|ids| ids.contains(&habit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RolloverHour;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn day(s: &str) -> LogicalDate {
        s.parse().unwrap()
    }

    fn clock() -> LogicalClock {
        LogicalClock::new(RolloverHour::new(3))
    }

    #[test]
    fn parent_check_covers() {
        let records = vec![ActivityRecord::check(HabitId(1), ts("2024-01-15T12:00:00Z"))];
        let covered = covered_habit_ids(&records, &clock(), &ObserverZone::utc(), day("2024-01-15"), None);
        assert!(covered.contains(&HabitId(1)));
    }

    #[test]
    fn sub_habit_check_never_covers_parent() {
        let records = vec![ActivityRecord::sub_check(HabitId(1), 111, ts("2024-01-15T12:00:00Z"))];
        let covered = covered_habit_ids(&records, &clock(), &ObserverZone::utc(), day("2024-01-15"), None);
        assert!(!covered.contains(&HabitId(1)));
    }

    #[test]
    fn early_morning_record_belongs_to_previous_day() {
        let records = vec![
            ActivityRecord::count(HabitId(2), 20.0, ts("2024-01-16T02:30:00Z")),
            ActivityRecord::weight(HabitId(3), 71.2, ts("2024-01-16T03:00:00Z")),
        ];
        let zone = ObserverZone::utc();
        let on_15 = covered_habit_ids(&records, &clock(), &zone, day("2024-01-15"), None);
        let on_16 = covered_habit_ids(&records, &clock(), &zone, day("2024-01-16"), None);
        assert_eq!(on_15, BTreeSet::from([HabitId(2)]));
        assert_eq!(on_16, BTreeSet::from([HabitId(3)]));
    }

    #[test]
    fn allow_list_filters() {
        let t = ts("2024-01-15T12:00:00Z");
        let records = vec![
            ActivityRecord::check(HabitId(1), t),
            ActivityRecord::check(HabitId(2), t),
        ];
        let allow = BTreeSet::from([HabitId(2)]);
        let covered =
            covered_habit_ids(&records, &clock(), &ObserverZone::utc(), day("2024-01-15"), Some(&allow));
        assert_eq!(covered, BTreeSet::from([HabitId(2)]));
    }

    #[test]
    fn index_matches_direct_computation() {
        let zone = ObserverZone::utc();
        let records = vec![
            ActivityRecord::check(HabitId(1), ts("2024-01-14T22:00:00Z")),
            ActivityRecord::check(HabitId(2), ts("2024-01-15T01:00:00Z")),
            ActivityRecord::sub_check(HabitId(3), 9, ts("2024-01-15T09:00:00Z")),
            ActivityRecord::count(HabitId(4), 1.0, ts("2024-01-15T09:00:00Z")),
        ];
        let index = ActivityCoverageIndex::build(&records, &clock(), &zone);
        for d in ["2024-01-13", "2024-01-14", "2024-01-15", "2024-01-16"] {
            assert_eq!(
                index.covered_on(day(d), None),
                covered_habit_ids(&records, &clock(), &zone, day(d), None),
                "mismatch on {d}"
            );
        }
        assert!(index.is_covered(day("2024-01-14"), HabitId(2)));
    }

    proptest! {
        #[test]
        fn adding_a_record_never_removes_coverage(
            offsets in prop::collection::vec((1i64..6, 0i64..(72 * 60)), 0..20),
            extra in (1i64..6, 0i64..(72 * 60)),
        ) {
            let base = ts("2024-01-14T00:00:00Z");
            let mut records: Vec<ActivityRecord> = offsets
                .iter()
                .map(|(id, mins)| ActivityRecord::check(HabitId(*id), base + Duration::minutes(*mins)))
                .collect();
            let zone = ObserverZone::utc();
            let target = day("2024-01-15");
            let before = covered_habit_ids(&records, &clock(), &zone, target, None);
            records.push(ActivityRecord::count(HabitId(extra.0), 1.0, base + Duration::minutes(extra.1)));
            let after = covered_habit_ids(&records, &clock(), &zone, target, None);
            prop_assert!(before.is_subset(&after));
        }
    }
}
