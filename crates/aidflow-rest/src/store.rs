//! [`WorkflowStore`] and [`RegistryStore`] over the REST gateway

use crate::client::RestClient;
use crate::error::ConnectError;
use crate::query::{Order, Query};
use aidflow_core::{
    Allocation, AllocationId, BackendConfig, Beneficiary, BeneficiaryId, BeneficiaryUpdate,
    Disburser, DisburserId, DisburserUpdate, FraudAlert, FraudAlertId, GoodsType, GoodsTypeId,
    NewAllocation, NewBeneficiary, NewDisburser, NewFraudAlert, NewGoodsType, Region, RegionId,
    RegionalGoods, RegionalGoodsId, RegistryStore, StoreError, WorkflowStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

const REGIONS: &str = "regions";
const BENEFICIARIES: &str = "beneficiaries";
const DISBURSERS: &str = "disbursers";
const GOODS_TYPES: &str = "goods_types";
const REGIONAL_GOODS: &str = "regional_goods";
const ALLOCATIONS: &str = "allocations";
const FRAUD_ALERTS: &str = "fraud_alerts";

#[derive(Debug, Deserialize)]
struct IdRow<T> {
    id: T,
}

#[derive(Debug, Serialize)]
struct StockRow {
    goods_type_id: GoodsTypeId,
    region_id: RegionId,
    quantity: u32,
}

/// Store backed by the hosted backend's REST gateway
#[derive(Debug, Clone)]
pub struct RestStore {
    client: RestClient,
}

impl RestStore {
    pub fn new(config: &BackendConfig) -> Result<Self, ConnectError> {
        Ok(Self {
            client: RestClient::new(config)?,
        })
    }

    #[must_use]
    pub fn from_client(client: RestClient) -> Self {
        Self { client }
    }

    #[inline]
    #[must_use]
    pub fn client(&self) -> &RestClient {
        &self.client
    }

    async fn update_one<B, T>(&self, query: Query, body: &B, what: &str) -> Result<T, StoreError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self.client.update(&query, body).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(what.to_string()))
    }
}

#[async_trait]
impl WorkflowStore for RestStore {
    async fn find_recent_allocation(
        &self,
        beneficiary: BeneficiaryId,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let query = Query::table(ALLOCATIONS)
            .select("id")
            .eq("beneficiary_id", beneficiary)
            .gte_time("created_at", since);
        let row: Option<IdRow<AllocationId>> = self.client.select_one(query).await?;
        Ok(row.is_some())
    }

    async fn insert_fraud_alert(&self, alert: NewFraudAlert) -> Result<FraudAlertId, StoreError> {
        let row: IdRow<FraudAlertId> = self.client.insert(FRAUD_ALERTS, &alert).await?;
        Ok(row.id)
    }

    async fn insert_allocation(
        &self,
        allocation: NewAllocation,
    ) -> Result<AllocationId, StoreError> {
        let row: IdRow<AllocationId> = self.client.insert(ALLOCATIONS, &allocation).await?;
        Ok(row.id)
    }

    async fn update_regional_goods_quantity(
        &self,
        id: RegionalGoodsId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let query = Query::table(REGIONAL_GOODS).eq("id", id).select("id");
        let _: IdRow<RegionalGoodsId> = self
            .update_one(query, &json!({ "quantity": quantity }), &format!("regional goods {id}"))
            .await?;
        Ok(())
    }

    async fn get_regional_goods(
        &self,
        id: RegionalGoodsId,
    ) -> Result<Option<RegionalGoods>, StoreError> {
        self.client
            .select_one(Query::table(REGIONAL_GOODS).eq("id", id))
            .await
    }

    async fn get_goods_type(&self, id: GoodsTypeId) -> Result<Option<GoodsType>, StoreError> {
        self.client
            .select_one(Query::table(GOODS_TYPES).eq("id", id))
            .await
    }

    async fn list_goods_types(&self) -> Result<Vec<GoodsType>, StoreError> {
        self.client
            .select(&Query::table(GOODS_TYPES).order("name", Order::Asc))
            .await
    }
}

#[async_trait]
impl RegistryStore for RestStore {
    async fn insert_region(&self, name: String) -> Result<Region, StoreError> {
        self.client.insert(REGIONS, &json!({ "name": name })).await
    }

    async fn get_region(&self, id: RegionId) -> Result<Option<Region>, StoreError> {
        self.client.select_one(Query::table(REGIONS).eq("id", id)).await
    }

    async fn list_regions(&self) -> Result<Vec<Region>, StoreError> {
        self.client
            .select(&Query::table(REGIONS).order("name", Order::Asc))
            .await
    }

    async fn insert_beneficiary(&self, new: NewBeneficiary) -> Result<Beneficiary, StoreError> {
        self.client.insert(BENEFICIARIES, &new).await
    }

    async fn get_beneficiary(&self, id: BeneficiaryId) -> Result<Option<Beneficiary>, StoreError> {
        self.client
            .select_one(Query::table(BENEFICIARIES).eq("id", id))
            .await
    }

    async fn list_beneficiaries(
        &self,
        region: Option<RegionId>,
    ) -> Result<Vec<Beneficiary>, StoreError> {
        let query = Query::table(BENEFICIARIES)
            .eq_opt("region_id", region)
            .order("created_at", Order::Desc);
        self.client.select(&query).await
    }

    async fn update_beneficiary(
        &self,
        id: BeneficiaryId,
        update: BeneficiaryUpdate,
    ) -> Result<Beneficiary, StoreError> {
        let query = Query::table(BENEFICIARIES).eq("id", id);
        self.update_one(query, &update, &format!("beneficiary {id}"))
            .await
    }

    async fn delete_beneficiary(&self, id: BeneficiaryId) -> Result<(), StoreError> {
        let removed = self
            .client
            .delete(&Query::table(BENEFICIARIES).eq("id", id))
            .await?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("beneficiary {id}")));
        }
        Ok(())
    }

    async fn insert_disburser(&self, new: NewDisburser) -> Result<Disburser, StoreError> {
        self.client.insert(DISBURSERS, &new).await
    }

    async fn get_disburser(&self, id: DisburserId) -> Result<Option<Disburser>, StoreError> {
        self.client
            .select_one(Query::table(DISBURSERS).eq("id", id))
            .await
    }

    async fn find_disburser_by_phone(&self, phone: &str) -> Result<Option<Disburser>, StoreError> {
        self.client
            .select_one(Query::table(DISBURSERS).eq("phone", phone))
            .await
    }

    async fn list_disbursers(&self) -> Result<Vec<Disburser>, StoreError> {
        self.client
            .select(&Query::table(DISBURSERS).order("name", Order::Asc))
            .await
    }

    async fn update_disburser(
        &self,
        id: DisburserId,
        update: DisburserUpdate,
    ) -> Result<Disburser, StoreError> {
        let query = Query::table(DISBURSERS).eq("id", id);
        self.update_one(query, &update, &format!("disburser {id}"))
            .await
    }

    async fn insert_goods_type(&self, new: NewGoodsType) -> Result<GoodsType, StoreError> {
        self.client.insert(GOODS_TYPES, &new).await
    }

    async fn delete_goods_type(&self, id: GoodsTypeId) -> Result<(), StoreError> {
        let removed = self
            .client
            .delete(&Query::table(GOODS_TYPES).eq("id", id))
            .await?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("goods type {id}")));
        }
        Ok(())
    }

    async fn upsert_regional_goods(
        &self,
        goods_type: GoodsTypeId,
        region: RegionId,
        quantity: u32,
    ) -> Result<RegionalGoods, StoreError> {
        let row = StockRow {
            goods_type_id: goods_type,
            region_id: region,
            quantity,
        };
        self.client
            .upsert(REGIONAL_GOODS, "goods_type_id,region_id", &row)
            .await
    }

    async fn list_regional_goods(
        &self,
        region: Option<RegionId>,
    ) -> Result<Vec<RegionalGoods>, StoreError> {
        let query = Query::table(REGIONAL_GOODS).eq_opt("region_id", region);
        self.client.select(&query).await
    }

    async fn list_allocations(
        &self,
        beneficiary: Option<BeneficiaryId>,
    ) -> Result<Vec<Allocation>, StoreError> {
        let query = Query::table(ALLOCATIONS)
            .eq_opt("beneficiary_id", beneficiary)
            .order("created_at", Order::Desc);
        self.client.select(&query).await
    }

    async fn list_fraud_alerts(
        &self,
        beneficiary: Option<BeneficiaryId>,
    ) -> Result<Vec<FraudAlert>, StoreError> {
        let query = Query::table(FRAUD_ALERTS)
            .eq_opt("beneficiary_id", beneficiary)
            .order("created_at", Order::Desc);
        self.client.select(&query).await
    }

    async fn delete_allocations_for(&self, beneficiary: BeneficiaryId) -> Result<u64, StoreError> {
        self.client
            .delete(&Query::table(ALLOCATIONS).eq("beneficiary_id", beneficiary))
            .await
    }

    async fn delete_fraud_alerts_for(
        &self,
        beneficiary: BeneficiaryId,
    ) -> Result<u64, StoreError> {
        self.client
            .delete(&Query::table(FRAUD_ALERTS).eq("beneficiary_id", beneficiary))
            .await
    }
}
