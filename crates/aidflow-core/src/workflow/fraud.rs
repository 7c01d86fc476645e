//! Fraud recorder: persists a blocked duplicate attempt

use crate::error::{RecordKind, WorkflowError};
use crate::goods::summarize;
use crate::store::WorkflowStore;
use crate::types::{BeneficiaryId, DisburserId, FraudAlertId, GeoLocation, NewFraudAlert};

const DETAILS_PREFIX: &str = "Duplicate allocation attempt: ";

/// Writes fraud alerts for blocked attempts
#[derive(Debug, Clone, Copy, Default)]
pub struct FraudRecorder;

impl FraudRecorder {
    /// Human-readable summary of the attempted goods
    #[must_use]
    pub fn details<S: AsRef<str>>(attempted: &[S]) -> String {
        format!("{DETAILS_PREFIX}{}", summarize(attempted))
    }

    /// Write one fraud alert. Never touches allocations or stock.
    ///
    /// # Errors
    /// `WriteFailed` if the insert fails; callers must not continue to the
    /// allocation step.
    pub async fn record<S, N>(
        &self,
        store: &S,
        beneficiary: BeneficiaryId,
        disburser: DisburserId,
        location: Option<GeoLocation>,
        attempted: &[N],
    ) -> Result<FraudAlertId, WorkflowError>
    where
        S: WorkflowStore + ?Sized,
        N: AsRef<str>,
    {
        let alert = NewFraudAlert {
            beneficiary_id: beneficiary,
            disburser_id: disburser,
            location,
            details: Self::details(attempted),
        };
        let id = store
            .insert_fraud_alert(alert)
            .await
            .map_err(|source| WorkflowError::WriteFailed {
                record: RecordKind::FraudAlert,
                source,
            })?;
        tracing::warn!(%beneficiary, %disburser, fraud_alert = %id, "duplicate allocation blocked");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MockWorkflowStore;

    #[test]
    fn details_list_goods_in_order() {
        assert_eq!(
            FraudRecorder::details(&["Hygiene Kit", "Blanket"]),
            "Duplicate allocation attempt: Hygiene Kit, Blanket"
        );
    }

    #[tokio::test]
    async fn writes_alert_with_details() {
        let beneficiary = BeneficiaryId::new();
        let mut store = MockWorkflowStore::new();
        store
            .expect_insert_fraud_alert()
            .withf(move |a| {
                a.beneficiary_id == beneficiary
                    && a.location.is_none()
                    && a.details.contains("Hygiene Kit")
            })
            .times(1)
            .returning(|_| Ok(FraudAlertId::new()));
        store.expect_insert_allocation().never();
        store.expect_update_regional_goods_quantity().never();

        FraudRecorder
            .record(&store, beneficiary, DisburserId::new(), None, &["Hygiene Kit"])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn insert_failure_is_write_failed() {
        let mut store = MockWorkflowStore::new();
        store
            .expect_insert_fraud_alert()
            .returning(|_| Err(StoreError::Rejected("rls".into())));

        let err = FraudRecorder
            .record(&store, BeneficiaryId::new(), DisburserId::new(), None, &["Rice"])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::WriteFailed {
                record: RecordKind::FraudAlert,
                ..
            }
        ));
    }
}
