//! Thin accessor over the session store.

use tracing::debug;

use super::{PendingReview, SessionState, SessionUpdate};
use crate::clock::{LogicalDate, RolloverHour};
use crate::error::{CoreError, CoreResult};
use crate::ports::SessionStore;

/// Maps store failures onto the review error taxonomy. Holds no business
/// rules: monotonic advancing is the reconciler's concern.
#[derive(Clone, Copy)]
pub struct SessionLedger<'a> {
    store: &'a dyn SessionStore,
}

impl<'a> SessionLedger<'a> {
    pub fn new(store: &'a dyn SessionStore) -> Self {
        Self { store }
    }

    /// # Errors
    /// Any read failure surfaces as [`CoreError::SessionUnavailable`].
    pub async fn load(&self) -> CoreResult<SessionState> {
        self.store.get().await.map_err(|e| match e {
            CoreError::SessionUnavailable(_) => e,
            other => CoreError::SessionUnavailable(other.to_string()),
        })
    }

    pub async fn set_pending_review(&self, review: Option<PendingReview>) -> CoreResult<()> {
        debug!(?review, "session: set pending review");
        self.write(
            "session.set_pending_review",
            SessionUpdate {
                pending_review: Some(review),
                ..SessionUpdate::default()
            },
        )
        .await
    }

    pub async fn advance_last_session_date(&self, date: LogicalDate) -> CoreResult<()> {
        debug!(%date, "session: advance last session date");
        self.write(
            "session.advance_last_session_date",
            SessionUpdate {
                last_session_date: Some(date),
                ..SessionUpdate::default()
            },
        )
        .await
    }

    pub async fn set_rollover_hour(&self, hour: RolloverHour) -> CoreResult<()> {
        self.write(
            "session.set_rollover_hour",
            SessionUpdate {
                rollover_hour: Some(hour),
                ..SessionUpdate::default()
            },
        )
        .await
    }

    /// Clear the pending review and advance the session date in one write.
    pub async fn finalize(&self, today: LogicalDate) -> CoreResult<()> {
        debug!(%today, "session: finalize");
        self.write(
            "session.finalize",
            SessionUpdate {
                last_session_date: Some(today),
                pending_review: Some(None),
                ..SessionUpdate::default()
            },
        )
        .await
    }

    async fn write(&self, operation: &'static str, update: SessionUpdate) -> CoreResult<()> {
        self.store.update(update).await.map_err(|e| match e {
            CoreError::RemoteMutationFailed { .. } => e,
            other => CoreError::mutation(operation, other),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct FlakyStore {
        state: RefCell<SessionState>,
        fail_reads: bool,
        fail_writes: bool,
    }

    #[async_trait(?Send)]
    impl SessionStore for FlakyStore {
        async fn get(&self) -> CoreResult<SessionState> {
            if self.fail_reads {
                return Err(CoreError::read("session.get", "timeout"));
            }
            Ok(self.state.borrow().clone())
        }

        async fn update(&self, update: SessionUpdate) -> CoreResult<()> {
            if self.fail_writes {
                return Err(CoreError::Io(std::io::Error::other("disk full")));
            }
            update.apply_to(&mut self.state.borrow_mut());
            Ok(())
        }
    }

    #[tokio::test]
    async fn read_failure_is_session_unavailable() {
        let store = FlakyStore {
            fail_reads: true,
            ..FlakyStore::default()
        };
        let err = SessionLedger::new(&store).load().await.unwrap_err();
        assert!(matches!(err, CoreError::SessionUnavailable(_)));
    }

    #[tokio::test]
    async fn write_failure_names_operation() {
        let store = FlakyStore {
            fail_writes: true,
            ..FlakyStore::default()
        };
        let err = SessionLedger::new(&store)
            .advance_last_session_date("2024-01-16".parse().unwrap())
            .await
            .unwrap_err();
        match err {
            CoreError::RemoteMutationFailed { operation, .. } => {
                assert_eq!(operation, "session.advance_last_session_date")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn finalize_clears_and_advances() {
        let store = FlakyStore::default();
        let ledger = SessionLedger::new(&store);
        ledger.set_rollover_hour(RolloverHour::new(5)).await.unwrap();
        ledger.finalize("2024-01-16".parse().unwrap()).await.unwrap();
        let state = ledger.load().await.unwrap();
        assert_eq!(state.rollover_hour.get(), 5);
        assert_eq!(state.last_session_date, "2024-01-16".parse().ok());
        assert!(state.pending_review.is_none());
    }
}
