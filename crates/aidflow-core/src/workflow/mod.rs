//! Allocation workflow engine
//!
//! Sequences one allocation attempt:
//! - Eligibility check against the recency window
//! - Fraud alert instead of an allocation when the beneficiary was served recently
//! - Allocation commit otherwise
//! - Per-good stock decrement, only after the commit succeeded
//!
//! # Example
//!
//! ```rust,ignore
//! use aidflow_core::{AllocationWorkflow, SubmitAllocation, WorkflowConfig};
//!
//! # async fn example(store: std::sync::Arc<aidflow_core::MemoryStore>) {
//! let workflow = AllocationWorkflow::new(store, WorkflowConfig::default());
//! let report = workflow.submit_allocation(request).await;
//! println!("{:?}: {}", report.outcome, report.message);
//! # }
//! ```

mod commit;
mod eligibility;
mod fraud;
mod inventory;

pub use commit::AllocationCommitter;
pub use eligibility::EligibilityChecker;
pub use fraud::FraudRecorder;
pub use inventory::{InventoryAdjuster, InventoryWarning, StockLine};

use crate::catalog::GoodsCatalog;
use crate::clock::{Clock, SystemClock};
use crate::config::WorkflowConfig;
use crate::error::{ErrorKind, ValidationError, WorkflowError};
use crate::goods::{summarize, GoodsEntry};
use crate::state::{AllocationState, Progress};
use crate::store::WorkflowStore;
use crate::types::{
    AllocationId, BeneficiaryId, DisburserId, FraudAlertId, GeoLocation, RegionalGoodsId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Allocation submission from the disburser screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAllocation {
    /// Recipient picked on the form
    pub beneficiary_id: Option<BeneficiaryId>,
    /// Logged-in disburser
    pub disburser_id: Option<DisburserId>,
    /// Stock lines picked on the form, one unit each
    pub selected_goods_ids: Vec<RegionalGoodsId>,
    /// Absent when the device could not provide a fix
    pub location: Option<GeoLocation>,
}

/// Result class of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// Allocation recorded
    Success,
    /// Duplicate blocked, fraud alert recorded
    FraudBlocked,
    /// Nothing recorded, or the fraud alert could not be written
    Failed,
}

/// What the submit handler shows the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReport {
    /// Result class
    pub outcome: Outcome,
    /// Text shown to the user
    pub message: String,
    /// Terminal state reached by the attempt
    pub state: AllocationState,
    /// Created allocation, on success
    pub allocation_id: Option<AllocationId>,
    /// Created fraud alert, when blocked
    pub fraud_alert_id: Option<FraudAlertId>,
    /// Lines whose stock could not be updated
    pub inventory_warnings: Vec<InventoryWarning>,
    /// Set on failure and on partial inventory failure
    pub error_kind: Option<ErrorKind>,
}

impl SubmissionReport {
    fn failed(state: AllocationState, error: &WorkflowError) -> Self {
        Self {
            outcome: Outcome::Failed,
            message: error.user_message(),
            state,
            allocation_id: None,
            fraud_alert_id: None,
            inventory_warnings: Vec::new(),
            error_kind: Some(error.kind()),
        }
    }

    /// True for `Outcome::Success`
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// A selected stock line resolved to its goods type and display name
#[derive(Debug, Clone)]
struct ResolvedGoods {
    entry: GoodsEntry,
    line: StockLine,
}

/// The allocation engine
///
/// Owns the goods catalog used for name resolution; no process-wide state.
#[derive(Debug)]
pub struct AllocationWorkflow<S: WorkflowStore + ?Sized> {
    store: Arc<S>,
    catalog: GoodsCatalog,
    eligibility: EligibilityChecker,
    fraud: FraudRecorder,
    committer: AllocationCommitter,
    adjuster: InventoryAdjuster,
}

impl<S: WorkflowStore + ?Sized> AllocationWorkflow<S> {
    /// Workflow on the system clock with a default catalog
    #[must_use]
    pub fn new(store: Arc<S>, config: WorkflowConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Workflow reading time from `clock`
    #[must_use]
    pub fn with_clock(store: Arc<S>, config: WorkflowConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            catalog: GoodsCatalog::default(),
            eligibility: EligibilityChecker::new(config.recency_window(), clock),
            fraud: FraudRecorder,
            committer: AllocationCommitter,
            adjuster: InventoryAdjuster,
        }
    }

    /// Replace the session catalog, e.g. one shared with other screens
    #[must_use]
    pub fn with_catalog(mut self, catalog: GoodsCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Catalog used for name resolution
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &GoodsCatalog {
        &self.catalog
    }

    /// Store the workflow writes to
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one allocation attempt to a terminal state
    ///
    /// Every error is caught here and turned into a report; nothing is retried.
    pub async fn submit_allocation(&self, request: SubmitAllocation) -> SubmissionReport {
        let mut progress = Progress::new();
        match self.run(&request, &mut progress).await {
            Ok(report) => {
                tracing::info!(outcome = ?report.outcome, state = ?report.state, "allocation attempt finished");
                report
            }
            Err(error) => {
                progress.fail();
                tracing::error!(%error, state = ?progress.state(), "allocation attempt failed");
                SubmissionReport::failed(progress.state(), &error)
            }
        }
    }

    async fn run(
        &self,
        request: &SubmitAllocation,
        progress: &mut Progress,
    ) -> Result<SubmissionReport, WorkflowError> {
        let (beneficiary, disburser) = validate(request)?;
        let goods = self.resolve_goods(&request.selected_goods_ids).await?;
        let names: Vec<&str> = goods.iter().map(|g| g.entry.name.as_str()).collect();

        progress.advance(AllocationState::CheckingEligibility)?;
        if self
            .eligibility
            .has_recent_allocation(self.store.as_ref(), beneficiary)
            .await?
        {
            return self
                .block(progress, beneficiary, disburser, request.location, &names)
                .await;
        }

        progress.advance(AllocationState::Committing)?;
        let entries = goods.iter().map(|g| g.entry.clone()).collect();
        let allocation_id = match self
            .committer
            .commit(self.store.as_ref(), beneficiary, disburser, entries, request.location)
            .await
        {
            Ok(id) => id,
            Err(e) if e.is_allocation_conflict() => {
                tracing::warn!(%beneficiary, "backend rejected allocation as duplicate");
                return self
                    .block(progress, beneficiary, disburser, request.location, &names)
                    .await;
            }
            Err(e) => return Err(e),
        };
        progress.advance(AllocationState::Committed)?;

        progress.advance(AllocationState::AdjustingInventory)?;
        let lines: Vec<StockLine> = goods.iter().map(|g| g.line.clone()).collect();
        let warnings = self.adjuster.adjust(self.store.as_ref(), &lines).await;
        progress.advance(AllocationState::Done)?;

        let (message, error_kind) = if warnings.is_empty() {
            (format!("Allocation recorded: {}.", summarize(&names)), None)
        } else {
            let soft = WorkflowError::PartialInventoryFailure(warnings.clone());
            tracing::warn!(%soft, allocation = %allocation_id, "allocation stands with stock inconsistency");
            (soft.user_message(), Some(soft.kind()))
        };

        Ok(SubmissionReport {
            outcome: Outcome::Success,
            message,
            state: progress.state(),
            allocation_id: Some(allocation_id),
            fraud_alert_id: None,
            inventory_warnings: warnings,
            error_kind,
        })
    }

    async fn block(
        &self,
        progress: &mut Progress,
        beneficiary: BeneficiaryId,
        disburser: DisburserId,
        location: Option<GeoLocation>,
        attempted: &[&str],
    ) -> Result<SubmissionReport, WorkflowError> {
        let alert_id = self
            .fraud
            .record(self.store.as_ref(), beneficiary, disburser, location, attempted)
            .await?;
        progress.advance(AllocationState::Blocked)?;

        let hours = self.eligibility.window().num_hours();
        Ok(SubmissionReport {
            outcome: Outcome::FraudBlocked,
            message: format!(
                "This beneficiary already received an allocation in the last {hours} hours. \
                 The attempt was blocked and a fraud alert was recorded."
            ),
            state: progress.state(),
            allocation_id: None,
            fraud_alert_id: Some(alert_id),
            inventory_warnings: Vec::new(),
            error_kind: None,
        })
    }

    async fn resolve_goods(
        &self,
        selected: &[RegionalGoodsId],
    ) -> Result<Vec<ResolvedGoods>, WorkflowError> {
        let store = self.store.as_ref();
        let mut region = None;
        let mut out = Vec::with_capacity(selected.len());
        for &id in selected {
            let row = store
                .get_regional_goods(id)
                .await
                .map_err(WorkflowError::DataUnavailable)?
                .ok_or(ValidationError::UnknownGoods(id))?;
            match region {
                None => region = Some(row.region_id),
                Some(r) if r != row.region_id => return Err(ValidationError::MixedRegions.into()),
                Some(_) => {}
            }
            let name = self
                .catalog
                .name_of(store, row.goods_type_id)
                .await
                .map_err(WorkflowError::DataUnavailable)?
                .ok_or(ValidationError::UnknownGoodsType(row.goods_type_id))?;
            out.push(ResolvedGoods {
                entry: GoodsEntry::single(row.goods_type_id, name.as_ref()),
                line: StockLine {
                    regional_goods_id: id,
                    goods_name: name.to_string(),
                },
            });
        }
        Ok(out)
    }
}

fn validate(request: &SubmitAllocation) -> Result<(BeneficiaryId, DisburserId), ValidationError> {
    let beneficiary = request
        .beneficiary_id
        .ok_or(ValidationError::MissingBeneficiary)?;
    let disburser = request
        .disburser_id
        .ok_or(ValidationError::MissingDisburser)?;
    if request.selected_goods_ids.is_empty() {
        return Err(ValidationError::NoGoodsSelected);
    }
    let mut seen = HashSet::with_capacity(request.selected_goods_ids.len());
    for id in &request.selected_goods_ids {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateGoods(*id));
        }
    }
    if let Some(location) = request.location {
        location.validated()?;
    }
    Ok((beneficiary, disburser))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::store::MockWorkflowStore;
    use crate::types::{GoodsType, GoodsTypeId, RegionId, RegionalGoods};
    use chrono::Utc;
    use mockall::Sequence;

    struct Line {
        row: RegionalGoods,
        goods: GoodsType,
    }

    fn line(name: &str, region: RegionId, quantity: u32) -> Line {
        let goods = GoodsType {
            id: GoodsTypeId::new(),
            name: name.to_string(),
            description: None,
        };
        Line {
            row: RegionalGoods {
                id: RegionalGoodsId::new(),
                goods_type_id: goods.id,
                region_id: region,
                quantity,
            },
            goods,
        }
    }

    fn expect_lookups(store: &mut MockWorkflowStore, lines: &[&Line]) {
        let rows: Vec<RegionalGoods> = lines.iter().map(|l| l.row).collect();
        let types: Vec<GoodsType> = lines.iter().map(|l| l.goods.clone()).collect();
        store
            .expect_get_regional_goods()
            .returning(move |id| Ok(rows.iter().find(|r| r.id == id).copied()));
        store
            .expect_get_goods_type()
            .returning(move |id| Ok(types.iter().find(|g| g.id == id).cloned()));
    }

    fn workflow(store: MockWorkflowStore) -> AllocationWorkflow<MockWorkflowStore> {
        AllocationWorkflow::with_clock(
            Arc::new(store),
            WorkflowConfig::default(),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    fn request(goods: Vec<RegionalGoodsId>) -> SubmitAllocation {
        SubmitAllocation {
            beneficiary_id: Some(BeneficiaryId::new()),
            disburser_id: Some(DisburserId::new()),
            selected_goods_ids: goods,
            location: None,
        }
    }

    #[tokio::test]
    async fn validation_happens_before_store_calls() {
        let store = MockWorkflowStore::new();
        let wf = workflow(store);

        let mut req = request(vec![]);
        let report = wf.submit_allocation(req.clone()).await;
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.error_kind, Some(ErrorKind::Validation));
        assert_eq!(report.state, AllocationState::Failed);

        let id = RegionalGoodsId::new();
        req.selected_goods_ids = vec![id, id];
        let report = wf.submit_allocation(req.clone()).await;
        assert_eq!(report.error_kind, Some(ErrorKind::Validation));

        req.selected_goods_ids = vec![id];
        req.beneficiary_id = None;
        let report = wf.submit_allocation(req).await;
        assert!(report.message.contains("no beneficiary selected"));
    }

    #[tokio::test]
    async fn eligible_commits_then_adjusts() {
        let region = RegionId::new();
        let water = line("Water Container", region, 3);
        let mut store = MockWorkflowStore::new();
        expect_lookups(&mut store, &[&water]);

        let mut seq = Sequence::new();
        store
            .expect_find_recent_allocation()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(false));
        store
            .expect_insert_allocation()
            .withf(|a| a.goods.len() == 1 && a.goods[0].quantity == 1)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(AllocationId::new()));
        store
            .expect_update_regional_goods_quantity()
            .with(mockall::predicate::eq(water.row.id), mockall::predicate::eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        store.expect_insert_fraud_alert().never();

        let report = workflow(store)
            .submit_allocation(request(vec![water.row.id]))
            .await;
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.state, AllocationState::Done);
        assert!(report.allocation_id.is_some());
        assert!(report.message.contains("Water Container"));
    }

    #[tokio::test]
    async fn recent_allocation_records_fraud_only() {
        let region = RegionId::new();
        let kit = line("Hygiene Kit", region, 7);
        let mut store = MockWorkflowStore::new();
        expect_lookups(&mut store, &[&kit]);
        store
            .expect_find_recent_allocation()
            .returning(|_, _| Ok(true));
        store
            .expect_insert_fraud_alert()
            .withf(|a| a.details.contains("Hygiene Kit"))
            .times(1)
            .returning(|_| Ok(FraudAlertId::new()));
        store.expect_insert_allocation().never();
        store.expect_update_regional_goods_quantity().never();

        let report = workflow(store).submit_allocation(request(vec![kit.row.id])).await;
        assert_eq!(report.outcome, Outcome::FraudBlocked);
        assert_eq!(report.state, AllocationState::Blocked);
        assert!(report.fraud_alert_id.is_some());
    }

    #[tokio::test]
    async fn fraud_write_failure_does_not_fall_through() {
        let kit = line("Hygiene Kit", RegionId::new(), 7);
        let mut store = MockWorkflowStore::new();
        expect_lookups(&mut store, &[&kit]);
        store
            .expect_find_recent_allocation()
            .returning(|_, _| Ok(true));
        store
            .expect_insert_fraud_alert()
            .returning(|_| Err(StoreError::Unavailable("down".into())));
        store.expect_insert_allocation().never();
        store.expect_update_regional_goods_quantity().never();

        let report = workflow(store).submit_allocation(request(vec![kit.row.id])).await;
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.error_kind, Some(ErrorKind::WriteFailed));
        assert_eq!(report.state, AllocationState::Failed);
    }

    #[tokio::test]
    async fn commit_failure_leaves_inventory_alone() {
        let water = line("Water Container", RegionId::new(), 3);
        let mut store = MockWorkflowStore::new();
        expect_lookups(&mut store, &[&water]);
        store
            .expect_find_recent_allocation()
            .returning(|_, _| Ok(false));
        store
            .expect_insert_allocation()
            .returning(|_| Err(StoreError::Unavailable("502".into())));
        store.expect_update_regional_goods_quantity().never();
        store.expect_insert_fraud_alert().never();

        let report = workflow(store)
            .submit_allocation(request(vec![water.row.id]))
            .await;
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.error_kind, Some(ErrorKind::WriteFailed));
        assert!(report.message.contains("No stock was deducted"));
    }

    #[tokio::test]
    async fn backend_conflict_becomes_fraud_block() {
        let water = line("Water Container", RegionId::new(), 3);
        let mut store = MockWorkflowStore::new();
        expect_lookups(&mut store, &[&water]);
        store
            .expect_find_recent_allocation()
            .returning(|_, _| Ok(false));
        store
            .expect_insert_allocation()
            .returning(|_| Err(StoreError::Conflict("recency constraint".into())));
        store
            .expect_insert_fraud_alert()
            .times(1)
            .returning(|_| Ok(FraudAlertId::new()));
        store.expect_update_regional_goods_quantity().never();

        let report = workflow(store)
            .submit_allocation(request(vec![water.row.id]))
            .await;
        assert_eq!(report.outcome, Outcome::FraudBlocked);
        assert_eq!(report.state, AllocationState::Blocked);
    }

    #[tokio::test]
    async fn eligibility_read_failure_is_data_unavailable() {
        let water = line("Water Container", RegionId::new(), 3);
        let mut store = MockWorkflowStore::new();
        expect_lookups(&mut store, &[&water]);
        store
            .expect_find_recent_allocation()
            .returning(|_, _| Err(StoreError::Unavailable("dns".into())));
        store.expect_insert_allocation().never();
        store.expect_insert_fraud_alert().never();

        let report = workflow(store)
            .submit_allocation(request(vec![water.row.id]))
            .await;
        assert_eq!(report.error_kind, Some(ErrorKind::DataUnavailable));
        assert_eq!(report.state, AllocationState::Failed);
    }

    #[tokio::test]
    async fn stock_failure_is_soft_warning() {
        let region = RegionId::new();
        let water = line("Water Container", region, 3);
        let rice = line("Rice", region, 1);
        let water_id = water.row.id;
        let mut store = MockWorkflowStore::new();
        expect_lookups(&mut store, &[&water, &rice]);
        store
            .expect_find_recent_allocation()
            .returning(|_, _| Ok(false));
        store
            .expect_insert_allocation()
            .returning(|_| Ok(AllocationId::new()));
        store
            .expect_update_regional_goods_quantity()
            .returning(move |id, _| {
                if id == water_id {
                    Err(StoreError::Unavailable("timeout".into()))
                } else {
                    Ok(())
                }
            });

        let report = workflow(store)
            .submit_allocation(request(vec![water.row.id, rice.row.id]))
            .await;
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.error_kind, Some(ErrorKind::PartialInventoryFailure));
        assert_eq!(report.inventory_warnings.len(), 1);
        assert!(report.message.contains("Water Container"));
    }

    #[tokio::test]
    async fn mixed_regions_are_rejected() {
        let a = line("Water Container", RegionId::new(), 3);
        let b = line("Rice", RegionId::new(), 3);
        let mut store = MockWorkflowStore::new();
        expect_lookups(&mut store, &[&a, &b]);
        store.expect_find_recent_allocation().never();

        let report = workflow(store)
            .submit_allocation(request(vec![a.row.id, b.row.id]))
            .await;
        assert_eq!(report.error_kind, Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn out_of_range_location_is_rejected_before_store_calls() {
        let wf = workflow(MockWorkflowStore::new());

        let mut req = request(vec![RegionalGoodsId::new()]);
        req.location = Some(GeoLocation {
            latitude: 500.0,
            longitude: f64::NAN,
        });
        let report = wf.submit_allocation(req.clone()).await;
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.error_kind, Some(ErrorKind::Validation));
        assert_eq!(report.allocation_id, None);

        let mut json = serde_json::to_value(&req).unwrap();
        json["location"] = serde_json::json!({ "latitude": 123.0, "longitude": 999.0 });
        let decoded: SubmitAllocation = serde_json::from_value(json).unwrap();
        let report = wf.submit_allocation(decoded).await;
        assert_eq!(report.error_kind, Some(ErrorKind::Validation));
    }

    #[test]
    fn error_kind_serializes_in_report() {
        let report = SubmissionReport::failed(
            AllocationState::Failed,
            &WorkflowError::Validation(ValidationError::NoGoodsSelected),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["error_kind"], "validation");
        let back: SubmissionReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
