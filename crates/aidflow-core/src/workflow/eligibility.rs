//! Eligibility checker: has this beneficiary been served recently?

use crate::clock::Clock;
use crate::error::WorkflowError;
use crate::store::WorkflowStore;
use crate::types::BeneficiaryId;
use chrono::Duration;
use std::sync::Arc;

/// Decides whether a beneficiary was served inside the recency window
#[derive(Debug, Clone)]
pub struct EligibilityChecker {
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl EligibilityChecker {
    /// Checker over `window`, reading time from `clock`
    #[must_use]
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { window, clock }
    }

    /// Configured recency window
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// True when an allocation exists inside the recency window
    ///
    /// # Errors
    /// `DataUnavailable` if the history cannot be read. Not retried.
    pub async fn has_recent_allocation<S>(
        &self,
        store: &S,
        beneficiary: BeneficiaryId,
    ) -> Result<bool, WorkflowError>
    where
        S: WorkflowStore + ?Sized,
    {
        let since = self.clock.now() - self.window;
        store
            .find_recent_allocation(beneficiary, since)
            .await
            .map_err(WorkflowError::DataUnavailable)
    }

    /// Inverse of [`Self::has_recent_allocation`]
    pub async fn is_eligible<S>(
        &self,
        store: &S,
        beneficiary: BeneficiaryId,
    ) -> Result<bool, WorkflowError>
    where
        S: WorkflowStore + ?Sized,
    {
        Ok(!self.has_recent_allocation(store, beneficiary).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::store::MockWorkflowStore;
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;

    #[tokio::test]
    async fn queries_from_window_start() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        let beneficiary = BeneficiaryId::new();
        let mut store = MockWorkflowStore::new();
        store
            .expect_find_recent_allocation()
            .with(eq(beneficiary), eq(now - Duration::days(30)))
            .times(1)
            .returning(|_, _| Ok(false));

        let checker = EligibilityChecker::new(Duration::days(30), Arc::new(ManualClock::new(now)));
        assert!(checker.is_eligible(&store, beneficiary).await.unwrap());
    }

    #[tokio::test]
    async fn read_failure_is_data_unavailable() {
        let mut store = MockWorkflowStore::new();
        store
            .expect_find_recent_allocation()
            .returning(|_, _| Err(StoreError::Unavailable("timeout".into())));

        let checker = EligibilityChecker::new(
            Duration::hours(24),
            Arc::new(ManualClock::new(Utc::now())),
        );
        let err = checker
            .has_recent_allocation(&store, BeneficiaryId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DataUnavailable(_)));
    }
}
