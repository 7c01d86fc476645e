//! Error types for Aidflow Core
//!
//! Provides error handling for:
//! - Store access failures (transport, conflicts, decoding)
//! - Allocation workflow failures and soft warnings
//! - Registry (admin CRUD) failures
//! - Configuration loading

use crate::state::AllocationState;
use crate::types::{GoodsTypeId, RegionalGoodsId};
use crate::workflow::InventoryWarning;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Errors reported by a data store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend cannot be reached or answered with a server error
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Uniqueness or conditional-write rejection
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Addressed record does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// Backend refused the request (constraint, permission)
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Payload could not be decoded
    #[error("malformed payload: {0}")]
    Decode(String),
}

/// Input problems caught before any store call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Beneficiary id missing
    #[error("no beneficiary selected")]
    MissingBeneficiary,

    /// Disburser id missing
    #[error("no disburser on the submission")]
    MissingDisburser,

    /// Empty goods selection
    #[error("no goods selected")]
    NoGoodsSelected,

    /// Same stock line picked twice
    #[error("goods {0} selected more than once")]
    DuplicateGoods(RegionalGoodsId),

    /// Stock line unknown to the store
    #[error("goods {0} is not in stock records")]
    UnknownGoods(RegionalGoodsId),

    /// Stock line points at a goods type the store does not have
    #[error("goods type {0} is missing from the catalog")]
    UnknownGoodsType(GoodsTypeId),

    /// Lines from different regions in one submission
    #[error("selected goods span more than one region")]
    MixedRegions,

    /// Coordinates outside the valid range
    #[error("location ({latitude}, {longitude}) is out of range")]
    InvalidLocation {
        /// Submitted latitude
        latitude: f64,
        /// Submitted longitude
        longitude: f64,
    },
}

/// Which record a failed write was for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// The alert written when a duplicate is blocked
    FraudAlert,
    /// The allocation row itself
    Allocation,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::FraudAlert => f.write_str("fraud alert"),
            RecordKind::Allocation => f.write_str("allocation"),
        }
    }
}

/// Classification used by callers deciding how to notify the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Bad input, nothing written
    Validation,
    /// A read failed, nothing written
    DataUnavailable,
    /// An insert failed
    WriteFailed,
    /// Allocation stands, some stock counts were not updated
    PartialInventoryFailure,
    /// Workflow bug, such as an illegal state transition
    Internal,
}

/// Allocation workflow errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    /// Submission rejected before touching the store
    #[error("invalid submission: {0}")]
    Validation(#[from] ValidationError),

    /// A read needed by the workflow failed
    #[error("data unavailable: {0}")]
    DataUnavailable(#[source] StoreError),

    /// Fraud alert or allocation insert failed
    #[error("failed to record {record}: {source}")]
    WriteFailed {
        /// Record that was not written
        record: RecordKind,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// Allocation committed but some stock counts were not decremented
    #[error("inventory not adjusted for {} goods", .0.len())]
    PartialInventoryFailure(Vec<InventoryWarning>),

    /// State machine misuse
    #[error("illegal allocation transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: AllocationState,
        to: AllocationState,
    },
}

impl WorkflowError {
    /// Classification for the report
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::DataUnavailable(_) => ErrorKind::DataUnavailable,
            Self::WriteFailed { .. } => ErrorKind::WriteFailed,
            Self::PartialInventoryFailure(_) => ErrorKind::PartialInventoryFailure,
            Self::IllegalTransition { .. } => ErrorKind::Internal,
        }
    }

    /// Backend rejected an allocation insert as a duplicate
    #[inline]
    #[must_use]
    pub fn is_allocation_conflict(&self) -> bool {
        matches!(
            self,
            Self::WriteFailed {
                record: RecordKind::Allocation,
                source: StoreError::Conflict(_),
            }
        )
    }

    /// Soft warnings leave the allocation standing
    #[inline]
    #[must_use]
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::PartialInventoryFailure(_))
    }

    /// Notification text for the person at the submit button
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => format!("Please fix the form: {e}."),
            Self::DataUnavailable(_) => {
                "Could not check allocation history. Nothing was recorded; please try again."
                    .to_string()
            }
            Self::WriteFailed {
                record: RecordKind::FraudAlert,
                ..
            } => "Duplicate allocation blocked, but the fraud alert could not be saved. \
                  Please report this to an administrator."
                .to_string(),
            Self::WriteFailed {
                record: RecordKind::Allocation,
                ..
            } => "The allocation could not be saved. No stock was deducted; please try again."
                .to_string(),
            Self::PartialInventoryFailure(warnings) => {
                let names: Vec<&str> = warnings.iter().map(|w| w.goods_name.as_str()).collect();
                format!(
                    "Allocation recorded, but stock counts were not updated for: {}. \
                     Please reconcile inventory.",
                    crate::goods::summarize(&names)
                )
            }
            Self::IllegalTransition { .. } => {
                "Internal error while processing the allocation.".to_string()
            }
        }
    }
}

/// Registry (admin and registration screens) errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Input failed a field check
    #[error("invalid input: {0}")]
    Validation(String),

    /// Addressed record does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Record kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Unique key already taken
    #[error("{entity} already exists: {key}")]
    Duplicate {
        /// Record kind
        entity: &'static str,
        /// Clashing value
        key: String,
    },

    /// Other records still reference it
    #[error("{entity} {id} is still referenced")]
    InUse {
        /// Record kind
        entity: &'static str,
        /// Referenced id
        id: String,
    },

    /// Password hashing or verification failed
    #[error("credential error: {0}")]
    Credential(String),

    /// Underlying store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RegistryError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_error_kinds() {
        let err = WorkflowError::from(ValidationError::NoGoodsSelected);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("no goods selected"));

        let err = WorkflowError::DataUnavailable(StoreError::Unavailable("down".into()));
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        assert!(!err.is_soft());
    }

    #[test]
    fn conflict_detection_is_allocation_only() {
        let alloc = WorkflowError::WriteFailed {
            record: RecordKind::Allocation,
            source: StoreError::Conflict("recent allocation".into()),
        };
        assert!(alloc.is_allocation_conflict());

        let alert = WorkflowError::WriteFailed {
            record: RecordKind::FraudAlert,
            source: StoreError::Conflict("dup".into()),
        };
        assert!(!alert.is_allocation_conflict());
    }

    #[test]
    fn partial_inventory_message_names_goods() {
        let err = WorkflowError::PartialInventoryFailure(vec![InventoryWarning {
            regional_goods_id: RegionalGoodsId::new(),
            goods_name: "Blanket".to_string(),
            reason: "timeout".to_string(),
        }]);
        assert!(err.is_soft());
        assert!(err.user_message().contains("Blanket"));
    }

    #[test]
    fn write_failed_display_names_record() {
        let err = WorkflowError::WriteFailed {
            record: RecordKind::FraudAlert,
            source: StoreError::Rejected("permission denied".into()),
        };
        assert_eq!(
            err.to_string(),
            "failed to record fraud alert: request rejected: permission denied"
        );
    }
}
