//! Daily review backed by the on-disk SQLite store.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use habitrail_core::ports::RewardLedger;
use habitrail_core::{
    ActivityRecord, Database, DetectOutcome, FixedClock, Habit, HabitId, LogicalDate,
    ObserverZone, Resolution, ReviewReconciler, SessionUpdate, WallClockMoment,
};

fn moment(s: &str) -> WallClockMoment {
    WallClockMoment::parse(s, &ObserverZone::utc()).unwrap()
}

fn utc(s: &str) -> DateTime<Utc> {
    moment(s).instant()
}

fn date(s: &str) -> LogicalDate {
    s.parse().unwrap()
}

fn seeded(db: &Database) {
    db.upsert_habit(&Habit::new(1, "Run").with_rewards(5, 10)).unwrap();
    db.upsert_habit(&Habit::new(2, "Read").with_rewards(2, 3)).unwrap();
    db.insert_activity(&ActivityRecord::check(HabitId(2), utc("2024-01-15T21:00:00Z")))
        .unwrap();
    db.update_session(&SessionUpdate {
        last_session_date: Some(date("2024-01-14")),
        ..SessionUpdate::default()
    })
    .unwrap();
}

#[tokio::test]
async fn review_survives_reopen_and_finalizes_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitrail.db");
    let clock = FixedClock::new(moment("2024-01-16T04:00:00+00:00"));

    let pending = {
        let db = Database::open_at(&path).unwrap();
        seeded(&db);
        let review = ReviewReconciler::new(&db, &db, &db, &db, &clock);
        let DetectOutcome::Created { pending } = review.detect().await.unwrap() else {
            panic!("expected a new review");
        };
        pending
    };

    // A fresh process adopts the stored review instead of recomputing it.
    let db = Database::open_at(&path).unwrap();
    let review = ReviewReconciler::new(&db, &db, &db, &db, &clock).with_journal(&db);
    assert_eq!(review.detect().await.unwrap(), DetectOutcome::Resumed { pending });
    let snapshot = review.snapshot();
    assert_eq!(
        snapshot.current_day().unwrap().outstanding(),
        BTreeSet::from([HabitId(1)])
    );

    let report = review.apply_penalties().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(db.balance().await.unwrap(), -10);

    let state = db.session_state().unwrap();
    assert_eq!(state.pending_review, None);
    assert_eq!(state.last_session_date, Some(date("2024-01-16")));

    let log = db.review_log(10).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].resolution, Resolution::PenaltiesApplied);
    assert_eq!(log[0].scheduled, 2);
    assert_eq!(log[0].completed, 1);
    assert_eq!(log[0].penalty, 10);
}

#[tokio::test]
async fn toggled_check_lands_inside_reviewed_day() {
    let db = Database::open_memory().unwrap();
    seeded(&db);
    let clock = FixedClock::new(moment("2024-01-16T04:00:00+00:00"));
    let review = ReviewReconciler::new(&db, &db, &db, &db, &clock);
    review.detect().await.unwrap();

    review.toggle_habit(HabitId(1), true).await.unwrap();
    assert!(db
        .checks()
        .unwrap()
        .contains(&ActivityRecord::check(HabitId(1), utc("2024-01-15T12:00:00Z"))));
    assert_eq!(db.reward_balance().unwrap(), 5);

    review.toggle_habit(HabitId(1), false).await.unwrap();
    assert_eq!(db.checks().unwrap().len(), 1);
    assert_eq!(db.reward_balance().unwrap(), 0);
}
