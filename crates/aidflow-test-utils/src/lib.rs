//! Testing utilities for Aidflow workspace
//!
//! Shared fixtures, a seeded in-memory store and a fault-injecting wrapper.

#![allow(missing_docs)]

use aidflow_core::{
    AllocationId, AllocationWorkflow, BeneficiaryId, DisburserId, FraudAlertId, GoodsType,
    GoodsTypeId, ManualClock, MemoryStore, NewAllocation, NewBeneficiary, NewDisburser,
    NewFraudAlert, NewGoodsType, RegionId, RegionalGoods, RegionalGoodsId, RegistryStore,
    StoreError, SubmitAllocation, WorkflowConfig, WorkflowStore,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Barrier, Notify};

/// Fixed start time for deterministic clocks
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// One region with a disburser, a beneficiary and three stock lines
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub region: RegionId,
    pub disburser: DisburserId,
    pub beneficiary: BeneficiaryId,
    /// "Water Container", stock 3
    pub water: RegionalGoodsId,
    /// "Hygiene Kit", stock 5
    pub hygiene_kit: RegionalGoodsId,
    /// "Tarpaulin", stock 0
    pub tarpaulin: RegionalGoodsId,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Same fixture, but the store rejects duplicate allocations itself
    pub async fn with_recency_guard(config: WorkflowConfig) -> Self {
        Self::build(Some(config)).await
    }

    async fn build(guard: Option<WorkflowConfig>) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let mut store = MemoryStore::with_clock(clock.clone());
        if let Some(config) = guard {
            store = store.with_recency_guard(config.recency_window());
        }
        let store = Arc::new(store);

        let region = store.insert_region("Turkana".to_string()).await.unwrap().id;
        let disburser = store
            .insert_disburser(NewDisburser {
                name: "Joseph Ekai".to_string(),
                phone: "+254700000001".to_string(),
                region_id: region,
                password_hash: String::new(),
                active: true,
            })
            .await
            .unwrap()
            .id;

        let mut fixture = Self {
            store,
            clock,
            region,
            disburser,
            beneficiary: BeneficiaryId::new(),
            water: RegionalGoodsId::new(),
            hygiene_kit: RegionalGoodsId::new(),
            tarpaulin: RegionalGoodsId::new(),
        };
        fixture.beneficiary = fixture.add_beneficiary("Amina Lokol").await;
        fixture.water = fixture.add_stock("Water Container", 3).await;
        fixture.hygiene_kit = fixture.add_stock("Hygiene Kit", 5).await;
        fixture.tarpaulin = fixture.add_stock("Tarpaulin", 0).await;
        fixture
    }

    pub async fn add_beneficiary(&self, name: &str) -> BeneficiaryId {
        self.store
            .insert_beneficiary(NewBeneficiary {
                name: name.to_string(),
                estimated_age: 30,
                height_cm: Some(165.0),
                region_id: self.region,
                registered_by: self.disburser,
                unique_identifiers: Default::default(),
            })
            .await
            .unwrap()
            .id
    }

    pub async fn add_stock(&self, name: &str, quantity: u32) -> RegionalGoodsId {
        let goods = self
            .store
            .insert_goods_type(NewGoodsType {
                name: name.to_string(),
                description: None,
            })
            .await
            .unwrap();
        self.store
            .upsert_regional_goods(goods.id, self.region, quantity)
            .await
            .unwrap()
            .id
    }

    pub fn quantity(&self, id: RegionalGoodsId) -> u32 {
        self.store.quantity_of(id).unwrap_or_default()
    }

    pub fn workflow(&self) -> AllocationWorkflow<MemoryStore> {
        AllocationWorkflow::with_clock(
            self.store.clone(),
            WorkflowConfig::default(),
            self.clock.clone(),
        )
    }

    pub fn request(&self, goods: &[RegionalGoodsId]) -> SubmitAllocation {
        self.request_for(self.beneficiary, goods)
    }

    pub fn request_for(
        &self,
        beneficiary: BeneficiaryId,
        goods: &[RegionalGoodsId],
    ) -> SubmitAllocation {
        SubmitAllocation {
            beneficiary_id: Some(beneficiary),
            disburser_id: Some(self.disburser),
            selected_goods_ids: goods.to_vec(),
            location: None,
        }
    }
}

/// Store operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FindRecentAllocation,
    InsertFraudAlert,
    InsertAllocation,
    UpdateQuantity,
    GetRegionalGoods,
    GetGoodsType,
}

/// Where a call waits before reaching the wrapped store
#[derive(Debug, Clone)]
enum Gate {
    /// Signal arrival, then never continue
    Park(Arc<Notify>),
    /// Continue once every party has arrived
    Rendezvous(Arc<Barrier>),
}

/// Wraps a [`MemoryStore`], failing selected operations with `Unavailable`
/// and optionally holding calls at a chosen operation
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    failing: Mutex<HashSet<Op>>,
    failing_lines: Mutex<HashSet<RegionalGoodsId>>,
    gates: Mutex<HashMap<Op, Gate>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            failing_lines: Mutex::new(HashSet::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().insert(op);
    }

    pub fn heal(&self, op: Op) {
        self.failing.lock().remove(&op);
    }

    /// Fail quantity updates for one stock line only
    pub fn fail_update_for(&self, id: RegionalGoodsId) {
        self.failing_lines.lock().insert(id);
    }

    /// Hold every call to `op` forever; the returned handle fires on arrival
    pub fn park_at(&self, op: Op) -> Arc<Notify> {
        let arrived = Arc::new(Notify::new());
        self.gates.lock().insert(op, Gate::Park(arrived.clone()));
        arrived
    }

    /// Hold calls to `op` until `parties` of them are waiting together
    pub fn rendezvous_at(&self, op: Op, parties: usize) {
        self.gates
            .lock()
            .insert(op, Gate::Rendezvous(Arc::new(Barrier::new(parties))));
    }

    async fn pass(&self, op: Op) -> Result<(), StoreError> {
        let gate = self.gates.lock().get(&op).cloned();
        match gate {
            Some(Gate::Park(arrived)) => {
                arrived.notify_one();
                std::future::pending::<()>().await;
            }
            Some(Gate::Rendezvous(barrier)) => {
                barrier.wait().await;
            }
            None => {}
        }
        self.check(op)
    }

    fn check(&self, op: Op) -> Result<(), StoreError> {
        if self.failing.lock().contains(&op) {
            Err(StoreError::Unavailable(format!("injected failure: {op:?}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WorkflowStore for FaultyStore {
    async fn find_recent_allocation(
        &self,
        beneficiary: BeneficiaryId,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.pass(Op::FindRecentAllocation).await?;
        self.inner.find_recent_allocation(beneficiary, since).await
    }

    async fn insert_fraud_alert(&self, alert: NewFraudAlert) -> Result<FraudAlertId, StoreError> {
        self.pass(Op::InsertFraudAlert).await?;
        self.inner.insert_fraud_alert(alert).await
    }

    async fn insert_allocation(
        &self,
        allocation: NewAllocation,
    ) -> Result<AllocationId, StoreError> {
        self.pass(Op::InsertAllocation).await?;
        self.inner.insert_allocation(allocation).await
    }

    async fn update_regional_goods_quantity(
        &self,
        id: RegionalGoodsId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        self.pass(Op::UpdateQuantity).await?;
        if self.failing_lines.lock().contains(&id) {
            return Err(StoreError::Unavailable(format!("injected failure for {id}")));
        }
        self.inner.update_regional_goods_quantity(id, quantity).await
    }

    async fn get_regional_goods(
        &self,
        id: RegionalGoodsId,
    ) -> Result<Option<RegionalGoods>, StoreError> {
        self.pass(Op::GetRegionalGoods).await?;
        self.inner.get_regional_goods(id).await
    }

    async fn get_goods_type(&self, id: GoodsTypeId) -> Result<Option<GoodsType>, StoreError> {
        self.pass(Op::GetGoodsType).await?;
        self.inner.get_goods_type(id).await
    }

    async fn list_goods_types(&self) -> Result<Vec<GoodsType>, StoreError> {
        self.pass(Op::GetGoodsType).await?;
        self.inner.list_goods_types().await
    }
}
