//! Registry service behind the admin and registration screens
//!
//! Validates input, keeps referential cleanup in the right order and hashes
//! disburser credentials. Persistence itself is the store's business.

use crate::error::{RegistryError, StoreError};
use crate::store::RegistryStore;
use crate::types::{
    Allocation, Beneficiary, BeneficiaryId, BeneficiaryUpdate, Disburser, DisburserId,
    DisburserUpdate, FraudAlert, GoodsType, GoodsTypeId, NewBeneficiary, NewDisburser,
    NewGoodsType, Region, RegionId, RegionalGoods,
};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use std::sync::Arc;

const MAX_AGE: u8 = 150;
const MIN_PASSWORD_LEN: usize = 8;

/// Rows removed by a beneficiary cascade delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    /// Fraud alerts removed
    pub fraud_alerts: u64,
    /// Allocations removed
    pub allocations: u64,
}

/// Disburser signup form
#[derive(Debug, Clone)]
pub struct DisburserSignup {
    /// Display name
    pub name: String,
    /// Login phone, normalised before storage
    pub phone: String,
    /// Home region; must exist
    pub region_id: RegionId,
    /// Plaintext password, hashed before storage
    pub password: String,
}

/// CRUD service over a [`RegistryStore`]
#[derive(Debug)]
pub struct Registry<S: RegistryStore + ?Sized> {
    store: Arc<S>,
}

impl<S: RegistryStore + ?Sized> Registry<S> {
    /// Service over `store`
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    // --- regions ---

    /// Create a region; names are unique ignoring ASCII case
    pub async fn create_region(&self, name: &str) -> Result<Region, RegistryError> {
        let name = required("region name", name)?;
        let regions = self.store.list_regions().await?;
        if regions.iter().any(|r| r.name.eq_ignore_ascii_case(&name)) {
            return Err(RegistryError::Duplicate {
                entity: "region",
                key: name,
            });
        }
        Ok(self.store.insert_region(name).await?)
    }

    /// All regions
    pub async fn list_regions(&self) -> Result<Vec<Region>, RegistryError> {
        Ok(self.store.list_regions().await?)
    }

    async fn require_region(&self, id: RegionId) -> Result<(), RegistryError> {
        match self.store.get_region(id).await? {
            Some(_) => Ok(()),
            None => Err(RegistryError::not_found("region", id)),
        }
    }

    // --- beneficiaries ---

    /// Register a beneficiary in an existing region
    pub async fn register_beneficiary(
        &self,
        mut new: NewBeneficiary,
    ) -> Result<Beneficiary, RegistryError> {
        new.name = required("beneficiary name", &new.name)?;
        check_age(new.estimated_age)?;
        check_height(new.height_cm)?;
        new.unique_identifiers
            .retain(|k, v| !k.trim().is_empty() && !v.trim().is_empty());
        self.require_region(new.region_id).await?;

        let beneficiary = self.store.insert_beneficiary(new).await?;
        tracing::info!(beneficiary = %beneficiary.id, region = %beneficiary.region_id, "beneficiary registered");
        Ok(beneficiary)
    }

    /// One beneficiary, or `NotFound`
    pub async fn beneficiary(&self, id: BeneficiaryId) -> Result<Beneficiary, RegistryError> {
        self.store
            .get_beneficiary(id)
            .await?
            .ok_or_else(|| RegistryError::not_found("beneficiary", id))
    }

    /// Beneficiaries, optionally in one region
    pub async fn list_beneficiaries(
        &self,
        region: Option<RegionId>,
    ) -> Result<Vec<Beneficiary>, RegistryError> {
        Ok(self.store.list_beneficiaries(region).await?)
    }

    /// Apply a partial update after the same checks as registration
    pub async fn update_beneficiary(
        &self,
        id: BeneficiaryId,
        mut update: BeneficiaryUpdate,
    ) -> Result<Beneficiary, RegistryError> {
        if let Some(name) = update.name.take() {
            update.name = Some(required("beneficiary name", &name)?);
        }
        if let Some(age) = update.estimated_age {
            check_age(age)?;
        }
        check_height(update.height_cm)?;
        self.store
            .update_beneficiary(id, update)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => RegistryError::not_found("beneficiary", id),
                other => other.into(),
            })
    }

    /// Delete a beneficiary and everything referencing it
    ///
    /// Children go first: fraud alerts, then allocations, then the
    /// beneficiary row. A failure part-way leaves the earlier deletions done.
    pub async fn delete_beneficiary(
        &self,
        id: BeneficiaryId,
    ) -> Result<CascadeSummary, RegistryError> {
        self.beneficiary(id).await?;
        let fraud_alerts = self.store.delete_fraud_alerts_for(id).await?;
        let allocations = self.store.delete_allocations_for(id).await?;
        self.store.delete_beneficiary(id).await?;
        tracing::info!(beneficiary = %id, fraud_alerts, allocations, "beneficiary deleted");
        Ok(CascadeSummary {
            fraud_alerts,
            allocations,
        })
    }

    // --- disbursers ---

    /// Create a disburser with a hashed password and a unique phone
    pub async fn create_disburser(
        &self,
        signup: DisburserSignup,
    ) -> Result<Disburser, RegistryError> {
        let name = required("disburser name", &signup.name)?;
        let phone = normalize_phone(&signup.phone)?;
        self.require_region(signup.region_id).await?;
        if self.store.find_disburser_by_phone(&phone).await?.is_some() {
            return Err(RegistryError::Duplicate {
                entity: "disburser",
                key: phone,
            });
        }
        let password_hash = hash_password(&signup.password)?;

        let disburser = self
            .store
            .insert_disburser(NewDisburser {
                name,
                phone,
                region_id: signup.region_id,
                password_hash,
                active: true,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(key) => RegistryError::Duplicate {
                    entity: "disburser",
                    key,
                },
                other => other.into(),
            })?;
        tracing::info!(disburser = %disburser.id, "disburser created");
        Ok(disburser)
    }

    /// All disbursers
    pub async fn list_disbursers(&self) -> Result<Vec<Disburser>, RegistryError> {
        Ok(self.store.list_disbursers().await?)
    }

    /// Enable or disable a disburser's login
    pub async fn set_disburser_active(
        &self,
        id: DisburserId,
        active: bool,
    ) -> Result<Disburser, RegistryError> {
        self.update_disburser(
            id,
            DisburserUpdate {
                active: Some(active),
                ..DisburserUpdate::default()
            },
        )
        .await
    }

    /// Replace a disburser's password
    pub async fn reset_password(
        &self,
        id: DisburserId,
        password: &str,
    ) -> Result<Disburser, RegistryError> {
        let hash = hash_password(password)?;
        self.update_disburser(
            id,
            DisburserUpdate {
                password_hash: Some(hash),
                ..DisburserUpdate::default()
            },
        )
        .await
    }

    /// Move a disburser to another existing region
    pub async fn reassign_disburser(
        &self,
        id: DisburserId,
        region: RegionId,
    ) -> Result<Disburser, RegistryError> {
        self.require_region(region).await?;
        self.update_disburser(
            id,
            DisburserUpdate {
                region_id: Some(region),
                ..DisburserUpdate::default()
            },
        )
        .await
    }

    async fn update_disburser(
        &self,
        id: DisburserId,
        update: DisburserUpdate,
    ) -> Result<Disburser, RegistryError> {
        self.store
            .update_disburser(id, update)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => RegistryError::not_found("disburser", id),
                other => other.into(),
            })
    }

    /// Check a phone/password pair; inactive disbursers never match
    pub async fn verify_login(
        &self,
        phone: &str,
        password: &str,
    ) -> Result<Option<Disburser>, RegistryError> {
        let Ok(phone) = normalize_phone(phone) else {
            return Ok(None);
        };
        let Some(disburser) = self.store.find_disburser_by_phone(&phone).await? else {
            return Ok(None);
        };
        if !disburser.active {
            tracing::debug!(disburser = %disburser.id, "login refused for inactive disburser");
            return Ok(None);
        }
        if verify_password(password, &disburser.password_hash)? {
            Ok(Some(disburser))
        } else {
            Ok(None)
        }
    }

    // --- goods ---

    /// Add a catalog entry; names are unique ignoring ASCII case
    pub async fn create_goods_type(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<GoodsType, RegistryError> {
        let name = required("goods name", name)?;
        let existing = self.store.list_goods_types().await?;
        if existing.iter().any(|g| g.name.eq_ignore_ascii_case(&name)) {
            return Err(RegistryError::Duplicate {
                entity: "goods type",
                key: name,
            });
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Ok(self
            .store
            .insert_goods_type(NewGoodsType { name, description })
            .await?)
    }

    /// Whole goods catalog
    pub async fn list_goods_types(&self) -> Result<Vec<GoodsType>, RegistryError> {
        Ok(self.store.list_goods_types().await?)
    }

    /// Remove a catalog entry no stock line refers to
    pub async fn delete_goods_type(&self, id: GoodsTypeId) -> Result<(), RegistryError> {
        let stock = self.store.list_regional_goods(None).await?;
        if stock.iter().any(|r| r.goods_type_id == id) {
            return Err(RegistryError::InUse {
                entity: "goods type",
                id: id.to_string(),
            });
        }
        self.store.delete_goods_type(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => RegistryError::not_found("goods type", id),
            other => other.into(),
        })
    }

    /// Set the stock count for a goods type in a region
    pub async fn set_stock(
        &self,
        goods_type: GoodsTypeId,
        region: RegionId,
        quantity: u32,
    ) -> Result<RegionalGoods, RegistryError> {
        if self.store.get_goods_type(goods_type).await?.is_none() {
            return Err(RegistryError::not_found("goods type", goods_type));
        }
        self.require_region(region).await?;
        Ok(self
            .store
            .upsert_regional_goods(goods_type, region, quantity)
            .await?)
    }

    /// Stock lines, optionally in one region
    pub async fn stock(&self, region: Option<RegionId>) -> Result<Vec<RegionalGoods>, RegistryError> {
        Ok(self.store.list_regional_goods(region).await?)
    }

    // --- history ---

    /// Allocations, newest first
    pub async fn allocations(
        &self,
        beneficiary: Option<BeneficiaryId>,
    ) -> Result<Vec<Allocation>, RegistryError> {
        Ok(self.store.list_allocations(beneficiary).await?)
    }

    /// Fraud alerts, newest first
    pub async fn fraud_alerts(
        &self,
        beneficiary: Option<BeneficiaryId>,
    ) -> Result<Vec<FraudAlert>, RegistryError> {
        Ok(self.store.list_fraud_alerts(beneficiary).await?)
    }
}

fn required(field: &str, value: &str) -> Result<String, RegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(RegistryError::validation(format!("{field} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}

fn check_age(age: u8) -> Result<(), RegistryError> {
    if age > MAX_AGE {
        return Err(RegistryError::validation(format!(
            "estimated age {age} exceeds {MAX_AGE}"
        )));
    }
    Ok(())
}

fn check_height(height: Option<f32>) -> Result<(), RegistryError> {
    match height {
        Some(h) if !(h.is_finite() && h > 0.0) => Err(RegistryError::validation(format!(
            "height {h} must be a positive number of centimetres"
        ))),
        _ => Ok(()),
    }
}

/// Strip spacing and punctuation; keep a single leading `+`
pub fn normalize_phone(raw: &str) -> Result<String, RegistryError> {
    let trimmed = raw.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };
    let mut digits = String::with_capacity(rest.len() + 1);
    digits.push_str(plus);
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => {
                return Err(RegistryError::validation(format!(
                    "phone number {raw:?} contains {c:?}"
                )))
            }
        }
    }
    let count = digits.len() - plus.len();
    if !(7..=15).contains(&count) {
        return Err(RegistryError::validation(format!(
            "phone number {raw:?} must have 7 to 15 digits"
        )));
    }
    Ok(digits)
}

fn hash_password(password: &str) -> Result<String, RegistryError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(RegistryError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| RegistryError::Credential(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, RegistryError> {
    let parsed = PasswordHash::new(hash).map_err(|e| RegistryError::Credential(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
