//! Data-store seams
//!
//! The hosted backend owns persistence, querying and joins. The workflow sees
//! it only through [`WorkflowStore`]; the admin and registration screens use
//! the wider [`RegistryStore`].

use crate::error::StoreError;
use crate::types::{
    Allocation, AllocationId, Beneficiary, BeneficiaryId, BeneficiaryUpdate, Disburser,
    DisburserId, DisburserUpdate, FraudAlert, FraudAlertId, GoodsType, GoodsTypeId,
    NewAllocation, NewBeneficiary, NewDisburser, NewFraudAlert, NewGoodsType, Region, RegionId,
    RegionalGoods, RegionalGoodsId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Operations consumed by the allocation workflow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Whether the beneficiary has an allocation created at or after `since`
    async fn find_recent_allocation(
        &self,
        beneficiary: BeneficiaryId,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Persist a fraud alert; the store stamps `created_at`
    async fn insert_fraud_alert(&self, alert: NewFraudAlert) -> Result<FraudAlertId, StoreError>;

    /// Persist an allocation; `Conflict` when the backend refuses a duplicate
    async fn insert_allocation(&self, allocation: NewAllocation)
        -> Result<AllocationId, StoreError>;

    /// Overwrite the stock count of one line
    async fn update_regional_goods_quantity(
        &self,
        id: RegionalGoodsId,
        quantity: u32,
    ) -> Result<(), StoreError>;

    /// One stock line, if it exists
    async fn get_regional_goods(
        &self,
        id: RegionalGoodsId,
    ) -> Result<Option<RegionalGoods>, StoreError>;

    /// One catalog entry, if it exists
    async fn get_goods_type(&self, id: GoodsTypeId) -> Result<Option<GoodsType>, StoreError>;

    /// Whole catalog, used to warm the name cache
    async fn list_goods_types(&self) -> Result<Vec<GoodsType>, StoreError>;
}

/// CRUD operations behind the admin and registration screens
#[async_trait]
pub trait RegistryStore: WorkflowStore {
    /// Create a region
    async fn insert_region(&self, name: String) -> Result<Region, StoreError>;
    /// One region, if it exists
    async fn get_region(&self, id: RegionId) -> Result<Option<Region>, StoreError>;
    /// All regions
    async fn list_regions(&self) -> Result<Vec<Region>, StoreError>;

    /// Create a beneficiary
    async fn insert_beneficiary(&self, new: NewBeneficiary) -> Result<Beneficiary, StoreError>;
    /// One beneficiary, if it exists
    async fn get_beneficiary(&self, id: BeneficiaryId) -> Result<Option<Beneficiary>, StoreError>;
    /// Beneficiaries, optionally in one region
    async fn list_beneficiaries(
        &self,
        region: Option<RegionId>,
    ) -> Result<Vec<Beneficiary>, StoreError>;
    /// Apply a partial update
    async fn update_beneficiary(
        &self,
        id: BeneficiaryId,
        update: BeneficiaryUpdate,
    ) -> Result<Beneficiary, StoreError>;
    /// Fails with `Rejected` while allocations or fraud alerts still reference it
    async fn delete_beneficiary(&self, id: BeneficiaryId) -> Result<(), StoreError>;

    /// Create a disburser; `Conflict` on a taken phone
    async fn insert_disburser(&self, new: NewDisburser) -> Result<Disburser, StoreError>;
    /// One disburser, if it exists
    async fn get_disburser(&self, id: DisburserId) -> Result<Option<Disburser>, StoreError>;
    /// Disburser by normalised phone
    async fn find_disburser_by_phone(&self, phone: &str)
        -> Result<Option<Disburser>, StoreError>;
    /// All disbursers
    async fn list_disbursers(&self) -> Result<Vec<Disburser>, StoreError>;
    /// Apply a partial update
    async fn update_disburser(
        &self,
        id: DisburserId,
        update: DisburserUpdate,
    ) -> Result<Disburser, StoreError>;

    /// Create a catalog entry
    async fn insert_goods_type(&self, new: NewGoodsType) -> Result<GoodsType, StoreError>;
    /// Remove a catalog entry
    async fn delete_goods_type(&self, id: GoodsTypeId) -> Result<(), StoreError>;

    /// Create or overwrite the stock line for `(goods_type, region)`
    async fn upsert_regional_goods(
        &self,
        goods_type: GoodsTypeId,
        region: RegionId,
        quantity: u32,
    ) -> Result<RegionalGoods, StoreError>;
    /// Stock lines, optionally in one region
    async fn list_regional_goods(
        &self,
        region: Option<RegionId>,
    ) -> Result<Vec<RegionalGoods>, StoreError>;

    /// Newest first
    async fn list_allocations(
        &self,
        beneficiary: Option<BeneficiaryId>,
    ) -> Result<Vec<Allocation>, StoreError>;
    /// Newest first
    async fn list_fraud_alerts(
        &self,
        beneficiary: Option<BeneficiaryId>,
    ) -> Result<Vec<FraudAlert>, StoreError>;
    /// Remove a beneficiary's allocations, returning how many
    async fn delete_allocations_for(&self, beneficiary: BeneficiaryId) -> Result<u64, StoreError>;
    /// Remove a beneficiary's fraud alerts, returning how many
    async fn delete_fraud_alerts_for(&self, beneficiary: BeneficiaryId)
        -> Result<u64, StoreError>;
}
