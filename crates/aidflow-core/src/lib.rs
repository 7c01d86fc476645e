//! Aidflow Core - allocation workflow for field aid distribution
//!
//! The part of the system with real business rules:
//! - Blocks duplicate allocations inside a recency window and records a fraud alert
//! - Commits allocations and decrements regional stock, floored at zero
//! - Registry operations for regions, beneficiaries, disbursers and goods
//!
//! Persistence is delegated to a hosted backend reached through the
//! [`WorkflowStore`] and [`RegistryStore`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use aidflow_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(beneficiary: BeneficiaryId, disburser: DisburserId, water: RegionalGoodsId) {
//! let store = Arc::new(MemoryStore::new());
//! let workflow = AllocationWorkflow::new(store, WorkflowConfig::default());
//!
//! let report = workflow
//!     .submit_allocation(SubmitAllocation {
//!         beneficiary_id: Some(beneficiary),
//!         disburser_id: Some(disburser),
//!         selected_goods_ids: vec![water],
//!         location: None,
//!     })
//!     .await;
//! println!("{:?}: {}", report.outcome, report.message);
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

// Core modules
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod goods;
pub mod memory;
pub mod registry;
pub mod state;
pub mod store;
pub mod types;
pub mod workflow;

// Re-exports for convenience
pub use catalog::{CatalogStats, GoodsCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AidflowConfig, BackendConfig, CatalogConfig, WorkflowConfig};
pub use error::{
    ConfigError, ErrorKind, RecordKind, RegistryError, StoreError, ValidationError,
    WorkflowError,
};
pub use goods::{decode_goods, GoodsEntry};
pub use memory::MemoryStore;
pub use registry::{CascadeSummary, DisburserSignup, Registry};
pub use state::{allowed_transitions, validate_transition, AllocationState};
pub use store::{RegistryStore, WorkflowStore};
pub use types::{
    Allocation, AllocationId, Beneficiary, BeneficiaryId, BeneficiaryUpdate, Disburser,
    DisburserId, DisburserUpdate, FraudAlert, FraudAlertId, GeoLocation, GoodsType, GoodsTypeId,
    NewAllocation, NewBeneficiary, NewDisburser, NewFraudAlert, NewGoodsType, Region, RegionId,
    RegionalGoods, RegionalGoodsId,
};
pub use workflow::{
    AllocationCommitter, AllocationWorkflow, EligibilityChecker, FraudRecorder,
    InventoryAdjuster, InventoryWarning, Outcome, StockLine, SubmissionReport, SubmitAllocation,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Aidflow Core
    pub use crate::{
        AllocationWorkflow, BeneficiaryId, DisburserId, GeoLocation, GoodsCatalog, MemoryStore,
        Outcome, RegionalGoodsId, Registry, RegistryStore, SubmissionReport, SubmitAllocation,
        WorkflowConfig, WorkflowStore,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
