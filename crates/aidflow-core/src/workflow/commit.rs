//! Allocation committer

use crate::error::{RecordKind, ValidationError, WorkflowError};
use crate::goods::GoodsEntry;
use crate::store::WorkflowStore;
use crate::types::{AllocationId, BeneficiaryId, DisburserId, GeoLocation, NewAllocation};

/// Persists one allocation record
///
/// Does not re-check eligibility: the caller sequences the eligibility read
/// before the commit. Without a backend constraint, two sessions can both
/// pass the read before either commits.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationCommitter;

impl AllocationCommitter {
    /// # Errors
    /// - `Validation(NoGoodsSelected)` for an empty goods list
    /// - `WriteFailed` if the insert fails; inventory must then be left alone
    pub async fn commit<S>(
        &self,
        store: &S,
        beneficiary: BeneficiaryId,
        disburser: DisburserId,
        goods: Vec<GoodsEntry>,
        location: Option<GeoLocation>,
    ) -> Result<AllocationId, WorkflowError>
    where
        S: WorkflowStore + ?Sized,
    {
        if goods.is_empty() {
            return Err(ValidationError::NoGoodsSelected.into());
        }
        let count = goods.len();
        let id = store
            .insert_allocation(NewAllocation {
                beneficiary_id: beneficiary,
                disburser_id: disburser,
                goods,
                location,
            })
            .await
            .map_err(|source| WorkflowError::WriteFailed {
                record: RecordKind::Allocation,
                source,
            })?;
        tracing::info!(%beneficiary, %disburser, allocation = %id, goods = count, "allocation committed");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MockWorkflowStore;
    use crate::types::GoodsTypeId;

    #[tokio::test]
    async fn empty_goods_never_reach_store() {
        let mut store = MockWorkflowStore::new();
        store.expect_insert_allocation().never();

        let err = AllocationCommitter
            .commit(&store, BeneficiaryId::new(), DisburserId::new(), vec![], None)
            .await
            .unwrap_err();
        assert_eq!(err, WorkflowError::Validation(ValidationError::NoGoodsSelected));
    }

    #[tokio::test]
    async fn conflict_is_reported_as_allocation_conflict() {
        let mut store = MockWorkflowStore::new();
        store
            .expect_insert_allocation()
            .returning(|_| Err(StoreError::Conflict("unique window".into())));

        let goods = vec![GoodsEntry::single(GoodsTypeId::new(), "Rice")];
        let err = AllocationCommitter
            .commit(&store, BeneficiaryId::new(), DisburserId::new(), goods, None)
            .await
            .unwrap_err();
        assert!(err.is_allocation_conflict());
    }
}
