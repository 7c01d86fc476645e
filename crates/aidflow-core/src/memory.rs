//! In-process store
//!
//! Mirrors the hosted backend closely enough for tests and offline demos:
//! ids and timestamps are assigned on insert, foreign keys are enforced, and
//! parents cannot be deleted while children still reference them.

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::store::{RegistryStore, WorkflowStore};
use crate::types::{
    Allocation, AllocationId, Beneficiary, BeneficiaryId, BeneficiaryUpdate, Disburser,
    DisburserId, DisburserUpdate, FraudAlert, FraudAlertId, GoodsType, GoodsTypeId,
    NewAllocation, NewBeneficiary, NewDisburser, NewFraudAlert, NewGoodsType, Region, RegionId,
    RegionalGoods, RegionalGoodsId,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Tables {
    regions: HashMap<RegionId, Region>,
    beneficiaries: HashMap<BeneficiaryId, Beneficiary>,
    disbursers: HashMap<DisburserId, Disburser>,
    goods_types: HashMap<GoodsTypeId, GoodsType>,
    regional_goods: HashMap<RegionalGoodsId, RegionalGoods>,
    // insertion order doubles as creation order
    allocations: Vec<Allocation>,
    fraud_alerts: Vec<FraudAlert>,
}

impl Tables {
    fn has_recent_allocation(&self, beneficiary: BeneficiaryId, since: DateTime<Utc>) -> bool {
        self.allocations
            .iter()
            .any(|a| a.beneficiary_id == beneficiary && a.created_at >= since)
    }
}

/// Store backed by in-memory tables
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
    recency_guard: Option<Duration>,
}

impl MemoryStore {
    /// Empty store on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty store stamping rows from `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
            recency_guard: None,
        }
    }

    /// Reject allocation inserts with `Conflict` when the beneficiary already
    /// has one inside `window`, checked under the same lock as the insert
    #[must_use]
    pub fn with_recency_guard(mut self, window: Duration) -> Self {
        self.recency_guard = Some(window);
        self
    }

    /// Allocations currently stored
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.tables.read().allocations.len()
    }

    /// Fraud alerts currently stored
    #[must_use]
    pub fn fraud_alert_count(&self) -> usize {
        self.tables.read().fraud_alerts.len()
    }

    /// Current stock of one line
    #[must_use]
    pub fn quantity_of(&self, id: RegionalGoodsId) -> Option<u32> {
        self.tables.read().regional_goods.get(&id).map(|r| r.quantity)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn fk_violation(what: &str, id: impl std::fmt::Display) -> StoreError {
    StoreError::Rejected(format!("foreign key violation: {what} {id} does not exist"))
}

fn newest_first<T, F>(rows: impl Iterator<Item = T>, keep: F) -> Vec<T>
where
    F: Fn(&T) -> bool,
{
    let mut out: Vec<T> = rows.filter(|r| keep(r)).collect();
    out.reverse();
    out
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn find_recent_allocation(
        &self,
        beneficiary: BeneficiaryId,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.tables.read().has_recent_allocation(beneficiary, since))
    }

    async fn insert_fraud_alert(&self, alert: NewFraudAlert) -> Result<FraudAlertId, StoreError> {
        let mut tables = self.tables.write();
        if !tables.beneficiaries.contains_key(&alert.beneficiary_id) {
            return Err(fk_violation("beneficiary", alert.beneficiary_id));
        }
        if !tables.disbursers.contains_key(&alert.disburser_id) {
            return Err(fk_violation("disburser", alert.disburser_id));
        }
        let id = FraudAlertId::new();
        tables.fraud_alerts.push(FraudAlert {
            id,
            beneficiary_id: alert.beneficiary_id,
            disburser_id: alert.disburser_id,
            location: alert.location,
            details: alert.details,
            created_at: self.now(),
        });
        Ok(id)
    }

    async fn insert_allocation(
        &self,
        allocation: NewAllocation,
    ) -> Result<AllocationId, StoreError> {
        let now = self.now();
        let mut tables = self.tables.write();
        if !tables.beneficiaries.contains_key(&allocation.beneficiary_id) {
            return Err(fk_violation("beneficiary", allocation.beneficiary_id));
        }
        if !tables.disbursers.contains_key(&allocation.disburser_id) {
            return Err(fk_violation("disburser", allocation.disburser_id));
        }
        if let Some(window) = self.recency_guard {
            if tables.has_recent_allocation(allocation.beneficiary_id, now - window) {
                return Err(StoreError::Conflict(format!(
                    "beneficiary {} already has an allocation in the recency window",
                    allocation.beneficiary_id
                )));
            }
        }
        let id = AllocationId::new();
        tables.allocations.push(Allocation {
            id,
            beneficiary_id: allocation.beneficiary_id,
            disburser_id: allocation.disburser_id,
            goods: allocation.goods,
            location: allocation.location,
            created_at: now,
        });
        Ok(id)
    }

    async fn update_regional_goods_quantity(
        &self,
        id: RegionalGoodsId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let row = tables
            .regional_goods
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("regional goods {id}")))?;
        row.quantity = quantity;
        Ok(())
    }

    async fn get_regional_goods(
        &self,
        id: RegionalGoodsId,
    ) -> Result<Option<RegionalGoods>, StoreError> {
        Ok(self.tables.read().regional_goods.get(&id).copied())
    }

    async fn get_goods_type(&self, id: GoodsTypeId) -> Result<Option<GoodsType>, StoreError> {
        Ok(self.tables.read().goods_types.get(&id).cloned())
    }

    async fn list_goods_types(&self) -> Result<Vec<GoodsType>, StoreError> {
        let mut out: Vec<GoodsType> = self.tables.read().goods_types.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn insert_region(&self, name: String) -> Result<Region, StoreError> {
        let region = Region {
            id: RegionId::new(),
            name,
        };
        self.tables.write().regions.insert(region.id, region.clone());
        Ok(region)
    }

    async fn get_region(&self, id: RegionId) -> Result<Option<Region>, StoreError> {
        Ok(self.tables.read().regions.get(&id).cloned())
    }

    async fn list_regions(&self) -> Result<Vec<Region>, StoreError> {
        let mut out: Vec<Region> = self.tables.read().regions.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn insert_beneficiary(&self, new: NewBeneficiary) -> Result<Beneficiary, StoreError> {
        let mut tables = self.tables.write();
        if !tables.regions.contains_key(&new.region_id) {
            return Err(fk_violation("region", new.region_id));
        }
        let beneficiary = Beneficiary {
            id: BeneficiaryId::new(),
            name: new.name,
            estimated_age: new.estimated_age,
            height_cm: new.height_cm,
            region_id: new.region_id,
            registered_by: new.registered_by,
            unique_identifiers: new.unique_identifiers,
            created_at: self.now(),
        };
        tables
            .beneficiaries
            .insert(beneficiary.id, beneficiary.clone());
        Ok(beneficiary)
    }

    async fn get_beneficiary(&self, id: BeneficiaryId) -> Result<Option<Beneficiary>, StoreError> {
        Ok(self.tables.read().beneficiaries.get(&id).cloned())
    }

    async fn list_beneficiaries(
        &self,
        region: Option<RegionId>,
    ) -> Result<Vec<Beneficiary>, StoreError> {
        let mut out: Vec<Beneficiary> = self
            .tables
            .read()
            .beneficiaries
            .values()
            .filter(|b| region.map_or(true, |r| b.region_id == r))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
        Ok(out)
    }

    async fn update_beneficiary(
        &self,
        id: BeneficiaryId,
        update: BeneficiaryUpdate,
    ) -> Result<Beneficiary, StoreError> {
        let mut tables = self.tables.write();
        let row = tables
            .beneficiaries
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("beneficiary {id}")))?;
        if let Some(name) = update.name {
            row.name = name;
        }
        if let Some(age) = update.estimated_age {
            row.estimated_age = age;
        }
        if let Some(height) = update.height_cm {
            row.height_cm = Some(height);
        }
        if let Some(ids) = update.unique_identifiers {
            row.unique_identifiers = ids;
        }
        Ok(row.clone())
    }

    async fn delete_beneficiary(&self, id: BeneficiaryId) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let referenced = tables.allocations.iter().any(|a| a.beneficiary_id == id)
            || tables.fraud_alerts.iter().any(|f| f.beneficiary_id == id);
        if referenced {
            return Err(StoreError::Rejected(format!(
                "beneficiary {id} is still referenced by allocations or fraud alerts"
            )));
        }
        tables
            .beneficiaries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("beneficiary {id}")))
    }

    async fn insert_disburser(&self, new: NewDisburser) -> Result<Disburser, StoreError> {
        let mut tables = self.tables.write();
        if !tables.regions.contains_key(&new.region_id) {
            return Err(fk_violation("region", new.region_id));
        }
        if tables.disbursers.values().any(|d| d.phone == new.phone) {
            return Err(StoreError::Conflict(format!("phone {} already registered", new.phone)));
        }
        let disburser = Disburser {
            id: DisburserId::new(),
            name: new.name,
            phone: new.phone,
            region_id: new.region_id,
            password_hash: new.password_hash,
            active: new.active,
            created_at: self.now(),
        };
        tables.disbursers.insert(disburser.id, disburser.clone());
        Ok(disburser)
    }

    async fn get_disburser(&self, id: DisburserId) -> Result<Option<Disburser>, StoreError> {
        Ok(self.tables.read().disbursers.get(&id).cloned())
    }

    async fn find_disburser_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<Disburser>, StoreError> {
        Ok(self
            .tables
            .read()
            .disbursers
            .values()
            .find(|d| d.phone == phone)
            .cloned())
    }

    async fn list_disbursers(&self) -> Result<Vec<Disburser>, StoreError> {
        let mut out: Vec<Disburser> = self.tables.read().disbursers.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn update_disburser(
        &self,
        id: DisburserId,
        update: DisburserUpdate,
    ) -> Result<Disburser, StoreError> {
        let mut tables = self.tables.write();
        if let Some(region) = update.region_id {
            if !tables.regions.contains_key(&region) {
                return Err(fk_violation("region", region));
            }
        }
        let row = tables
            .disbursers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("disburser {id}")))?;
        if let Some(name) = update.name {
            row.name = name;
        }
        if let Some(region) = update.region_id {
            row.region_id = region;
        }
        if let Some(hash) = update.password_hash {
            row.password_hash = hash;
        }
        if let Some(active) = update.active {
            row.active = active;
        }
        Ok(row.clone())
    }

    async fn insert_goods_type(&self, new: NewGoodsType) -> Result<GoodsType, StoreError> {
        let goods = GoodsType {
            id: GoodsTypeId::new(),
            name: new.name,
            description: new.description,
        };
        self.tables.write().goods_types.insert(goods.id, goods.clone());
        Ok(goods)
    }

    async fn delete_goods_type(&self, id: GoodsTypeId) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.regional_goods.values().any(|r| r.goods_type_id == id) {
            return Err(StoreError::Rejected(format!(
                "goods type {id} is still referenced by regional stock"
            )));
        }
        tables
            .goods_types
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("goods type {id}")))
    }

    async fn upsert_regional_goods(
        &self,
        goods_type: GoodsTypeId,
        region: RegionId,
        quantity: u32,
    ) -> Result<RegionalGoods, StoreError> {
        let mut tables = self.tables.write();
        if !tables.goods_types.contains_key(&goods_type) {
            return Err(fk_violation("goods type", goods_type));
        }
        if !tables.regions.contains_key(&region) {
            return Err(fk_violation("region", region));
        }
        if let Some(row) = tables
            .regional_goods
            .values_mut()
            .find(|r| r.goods_type_id == goods_type && r.region_id == region)
        {
            row.quantity = quantity;
            return Ok(*row);
        }
        let row = RegionalGoods {
            id: RegionalGoodsId::new(),
            goods_type_id: goods_type,
            region_id: region,
            quantity,
        };
        tables.regional_goods.insert(row.id, row);
        Ok(row)
    }

    async fn list_regional_goods(
        &self,
        region: Option<RegionId>,
    ) -> Result<Vec<RegionalGoods>, StoreError> {
        Ok(self
            .tables
            .read()
            .regional_goods
            .values()
            .filter(|r| region.map_or(true, |id| r.region_id == id))
            .copied()
            .collect())
    }

    async fn list_allocations(
        &self,
        beneficiary: Option<BeneficiaryId>,
    ) -> Result<Vec<Allocation>, StoreError> {
        let tables = self.tables.read();
        Ok(newest_first(tables.allocations.iter().cloned(), |a| {
            beneficiary.map_or(true, |b| a.beneficiary_id == b)
        }))
    }

    async fn list_fraud_alerts(
        &self,
        beneficiary: Option<BeneficiaryId>,
    ) -> Result<Vec<FraudAlert>, StoreError> {
        let tables = self.tables.read();
        Ok(newest_first(tables.fraud_alerts.iter().cloned(), |f| {
            beneficiary.map_or(true, |b| f.beneficiary_id == b)
        }))
    }

    async fn delete_allocations_for(&self, beneficiary: BeneficiaryId) -> Result<u64, StoreError> {
        let mut tables = self.tables.write();
        let before = tables.allocations.len();
        tables.allocations.retain(|a| a.beneficiary_id != beneficiary);
        Ok((before - tables.allocations.len()) as u64)
    }

    async fn delete_fraud_alerts_for(
        &self,
        beneficiary: BeneficiaryId,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write();
        let before = tables.fraud_alerts.len();
        tables.fraud_alerts.retain(|f| f.beneficiary_id != beneficiary);
        Ok((before - tables.fraud_alerts.len()) as u64)
    }
}
