//! HTTP plumbing for the hosted REST gateway

use crate::error::{from_decode, from_status, from_transport, ConnectError};
use crate::query::Query;
use aidflow_core::{BackendConfig, StoreError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

const REST_PATH: &str = "rest/v1/";

/// Ask the gateway to echo written rows back
const RETURN_ROWS: &str = "return=representation";
const MERGE_DUPLICATES: &str = "return=representation,resolution=merge-duplicates";

/// Gateway client bound to one project and schema
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base: Url,
    schema: String,
}

impl RestClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ConnectError> {
        let base = rest_base(&config.url)?;

        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref() {
            let apikey = HeaderValue::from_str(key).map_err(|_| ConnectError::InvalidApiKey)?;
            let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| ConnectError::InvalidApiKey)?;
            bearer.set_sensitive(true);
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base,
            schema: config.schema.clone(),
        })
    }

    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Full request URL for a query
    pub fn url(&self, query: &Query) -> Result<Url, StoreError> {
        let mut url = self
            .base
            .join(query.name())
            .map_err(|e| StoreError::Rejected(format!("bad table name {}: {e}", query.name())))?;
        if !query.params().is_empty() {
            url.query_pairs_mut().extend_pairs(query.params());
        }
        Ok(url)
    }

    /// `GET` rows matching the query
    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        let request = self.request(Method::GET, query)?;
        self.send(query.name(), request).await
    }

    /// `GET` at most one row
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        query: Query,
    ) -> Result<Option<T>, StoreError> {
        let rows = self.select(&query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// `POST` one row and return what the gateway stored
    pub async fn insert<B, T>(&self, table: &'static str, body: &B) -> Result<T, StoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let query = Query::table(table);
        let request = self
            .request(Method::POST, &query)?
            .header("Prefer", RETURN_ROWS)
            .json(body);
        first_row(table, self.send(table, request).await?)
    }

    /// `POST` with upsert semantics on the given unique columns
    pub async fn upsert<B, T>(
        &self,
        table: &'static str,
        conflict_columns: &str,
        body: &B,
    ) -> Result<T, StoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let query = Query::table(table).on_conflict(conflict_columns);
        let request = self
            .request(Method::POST, &query)?
            .header("Prefer", MERGE_DUPLICATES)
            .json(body);
        first_row(table, self.send(table, request).await?)
    }

    /// `PATCH` matching rows; returns the updated rows
    pub async fn update<B, T>(&self, query: &Query, body: &B) -> Result<Vec<T>, StoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::PATCH, query)?
            .header("Prefer", RETURN_ROWS)
            .json(body);
        self.send(query.name(), request).await
    }

    /// `DELETE` matching rows; returns how many went
    pub async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        let request = self
            .request(Method::DELETE, query)?
            .header("Prefer", RETURN_ROWS);
        let rows: Vec<serde_json::Value> = self.send(query.name(), request).await?;
        Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX))
    }

    fn request(&self, method: Method, query: &Query) -> Result<RequestBuilder, StoreError> {
        let url = self.url(query)?;
        let profile = if method == Method::GET {
            "Accept-Profile"
        } else {
            "Content-Profile"
        };
        Ok(self
            .http
            .request(method, url)
            .header(profile, self.schema.as_str()))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        table: &str,
        request: RequestBuilder,
    ) -> Result<T, StoreError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(table, error = %e, "backend request failed");
            from_transport(&e)
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| from_transport(&e))?;
        tracing::debug!(table, %status, bytes = body.len(), "backend response");

        if !status.is_success() {
            return Err(from_status(status, &body));
        }
        let text = if body.trim().is_empty() { "[]" } else { body.as_str() };
        serde_json::from_str(text).map_err(|e| from_decode(table, &e))
    }
}

fn rest_base(raw: &str) -> Result<Url, ConnectError> {
    let invalid = |source| ConnectError::InvalidUrl {
        url: raw.to_string(),
        source,
    };
    let mut root = Url::parse(raw).map_err(invalid)?;
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root.join(REST_PATH).map_err(invalid)
}

fn first_row<T>(table: &str, rows: Vec<T>) -> Result<T, StoreError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::Decode(format!("{table}: write returned no rows")))
}
