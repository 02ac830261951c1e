//! Per-user session state shared across devices.
//!
//! Persisted layout (JSON):
//!
//! ```text
//! {
//!   "day_rollover_hour": 3,
//!   "last_session_date": "2024-01-14",
//!   "pending_daily_review": { "review_date": "2024-01-15", "created_at": "2024-01-16T04:00:00+00:00" }
//! }
//! ```

mod ledger;

use serde::{Deserialize, Serialize};

use crate::clock::{LogicalDate, RolloverHour, WallClockMoment};

pub use ledger::SessionLedger;

/// Durable marker that a logical day awaits reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReview {
    pub review_date: LogicalDate,
    pub created_at: WallClockMoment,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(rename = "day_rollover_hour", default)]
    pub rollover_hour: RolloverHour,
    /// `None` until the first session is recorded.
    #[serde(default)]
    pub last_session_date: Option<LogicalDate>,
    #[serde(rename = "pending_daily_review", default)]
    pub pending_review: Option<PendingReview>,
}

/// Partial update; `None` fields are left untouched.
///
/// `pending_review: Some(None)` clears the pending review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub rollover_hour: Option<RolloverHour>,
    pub last_session_date: Option<LogicalDate>,
    pub pending_review: Option<Option<PendingReview>>,
}

impl SessionUpdate {
    pub fn is_empty(&self) -> bool {
        self.rollover_hour.is_none()
            && self.last_session_date.is_none()
            && self.pending_review.is_none()
    }

    pub fn apply_to(&self, state: &mut SessionState) {
        if let Some(hour) = self.rollover_hour {
            state.rollover_hour = hour;
        }
        if let Some(date) = self.last_session_date {
            state.last_session_date = Some(date);
        }
        if let Some(pending) = self.pending_review {
            state.pending_review = pending;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ObserverZone;

    #[test]
    fn deserializes_persisted_layout() {
        let state: SessionState = serde_json::from_str(
            r#"{
                "day_rollover_hour": 4,
                "last_session_date": "2024-01-14",
                "pending_daily_review": {
                    "review_date": "2024-01-15T00:00:00.000Z",
                    "created_at": "2024-01-16T04:00:00Z"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(state.rollover_hour.get(), 4);
        assert_eq!(state.last_session_date, "2024-01-14".parse().ok());
        let pending = state.pending_review.unwrap();
        assert_eq!(pending.review_date.to_string(), "2024-01-15");
    }

    #[test]
    fn empty_object_uses_defaults() {
        let state: SessionState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, SessionState::default());
        assert_eq!(state.rollover_hour.get(), 3);
    }

    #[test]
    fn update_clears_pending_only_when_asked() {
        let created_at =
            WallClockMoment::parse("2024-01-16T04:00:00Z", &ObserverZone::utc()).unwrap();
        let mut state = SessionState {
            pending_review: Some(PendingReview {
                review_date: "2024-01-15".parse().unwrap(),
                created_at,
            }),
            ..SessionState::default()
        };

        SessionUpdate {
            last_session_date: "2024-01-16".parse().ok(),
            ..SessionUpdate::default()
        }
        .apply_to(&mut state);
        assert!(state.pending_review.is_some());

        SessionUpdate {
            pending_review: Some(None),
            ..SessionUpdate::default()
        }
        .apply_to(&mut state);
        assert!(state.pending_review.is_none());
        assert_eq!(state.last_session_date, "2024-01-16".parse().ok());
    }
}
