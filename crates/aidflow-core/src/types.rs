//! Core records for aid distribution
//!
//! Defines the identifiers and rows the workflow and registry operate on:
//! - Regions, beneficiaries and disbursers
//! - Goods catalog entries and per-region stock lines
//! - Allocations and fraud alerts (immutable once created)

use crate::error::ValidationError;
use crate::goods::GoodsEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

record_id!(
    /// Region identifier
    RegionId
);
record_id!(
    /// Beneficiary identifier
    BeneficiaryId
);
record_id!(
    /// Disburser identifier
    DisburserId
);
record_id!(
    /// Goods catalog identifier
    GoodsTypeId
);
record_id!(
    /// Per-region stock line identifier
    RegionalGoodsId
);
record_id!(
    /// Allocation identifier
    AllocationId
);
record_id!(
    /// Fraud alert identifier
    FraudAlertId
);

/// Latitude/longitude pair reported by the device location service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

impl GeoLocation {
    /// Build a location, rejecting non-finite or out-of-range coordinates
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
        if lat_ok && lon_ok {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(ValidationError::InvalidLocation {
                latitude,
                longitude,
            })
        }
    }

    /// Re-check a location built from its public fields or deserialized
    pub fn validated(self) -> Result<Self, ValidationError> {
        Self::new(self.latitude, self.longitude)
    }
}

/// Administrative area that owns stock and staff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Row id
    pub id: RegionId,
    /// Display name
    pub name: String,
}

/// Registered aid recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    /// Row id
    pub id: BeneficiaryId,
    /// Full name
    pub name: String,
    /// Estimated age in years
    pub estimated_age: u8,
    /// Height in centimetres, when measured
    pub height_cm: Option<f32>,
    /// Home region
    pub region_id: RegionId,
    /// Disburser who registered them
    pub registered_by: DisburserId,
    /// Optional documents: national id, passport, birth certificate, ...
    #[serde(default)]
    pub unique_identifiers: BTreeMap<String, String>,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// Beneficiary registration payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBeneficiary {
    /// Full name
    pub name: String,
    /// Estimated age in years, at most 150
    pub estimated_age: u8,
    /// Height in centimetres, positive when given
    pub height_cm: Option<f32>,
    /// Home region; must exist
    pub region_id: RegionId,
    /// Registering disburser
    pub registered_by: DisburserId,
    /// Empty values are dropped on registration
    #[serde(default)]
    pub unique_identifiers: BTreeMap<String, String>,
}

/// Partial beneficiary update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeneficiaryUpdate {
    /// New name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New estimated age
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_age: Option<u8>,
    /// New height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f32>,
    /// Replacement document set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_identifiers: Option<BTreeMap<String, String>>,
}

/// Field operator who registers beneficiaries and hands out goods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disburser {
    /// Row id
    pub id: DisburserId,
    /// Full name
    pub name: String,
    /// Login identifier, stored normalised
    pub phone: String,
    /// Home region
    pub region_id: RegionId,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Inactive disbursers cannot log in
    pub active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Disburser insert payload, password already hashed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDisburser {
    /// Full name
    pub name: String,
    /// Normalised phone
    pub phone: String,
    /// Home region
    pub region_id: RegionId,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Whether login is allowed
    pub active: bool,
}

/// Partial disburser update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisburserUpdate {
    /// New name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<RegionId>,
    /// New Argon2 PHC string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// New login flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsType {
    /// Row id
    pub id: GoodsTypeId,
    /// Display name, unique ignoring case
    pub name: String,
    /// Free text shown to disbursers
    pub description: Option<String>,
}

/// Catalog insert payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGoodsType {
    /// Display name
    pub name: String,
    /// Free text
    pub description: Option<String>,
}

/// Stock count of one goods type in one region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalGoods {
    /// Row id
    pub id: RegionalGoodsId,
    /// Goods type counted
    pub goods_type_id: GoodsTypeId,
    /// Region holding the stock
    pub region_id: RegionId,
    /// Units on hand, never negative
    pub quantity: u32,
}

/// A completed distribution event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Row id
    pub id: AllocationId,
    /// Recipient
    pub beneficiary_id: BeneficiaryId,
    /// Disburser who handed the goods out
    pub disburser_id: DisburserId,
    /// Goods handed out, one unit each
    #[serde(deserialize_with = "crate::goods::deserialize_goods")]
    pub goods: Vec<GoodsEntry>,
    /// Device location, when available
    pub location: Option<GeoLocation>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Allocation insert payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAllocation {
    /// Recipient
    pub beneficiary_id: BeneficiaryId,
    /// Disburser handing the goods out
    pub disburser_id: DisburserId,
    /// Goods handed out
    pub goods: Vec<GoodsEntry>,
    /// Device location, when available
    pub location: Option<GeoLocation>,
}

/// Record of a blocked duplicate-allocation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAlert {
    /// Row id
    pub id: FraudAlertId,
    /// Beneficiary the attempt was for
    pub beneficiary_id: BeneficiaryId,
    /// Disburser who made the attempt
    pub disburser_id: DisburserId,
    /// Device location, when available
    pub location: Option<GeoLocation>,
    /// `Duplicate allocation attempt: ...` text
    pub details: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Fraud alert insert payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFraudAlert {
    /// Beneficiary the attempt was for
    pub beneficiary_id: BeneficiaryId,
    /// Disburser who made the attempt
    pub disburser_id: DisburserId,
    /// Device location, when available
    pub location: Option<GeoLocation>,
    /// Summary of the attempted goods
    pub details: String,
}
