//! Client for the hosted data store's REST query layer.
//!
//! All persistence lives in a managed Postgres exposed through a
//! PostgREST-style HTTP API. `Store` owns the connection details and
//! hands out [`TableQuery`] builders that translate filter chains into
//! query-string operators.

pub mod auth;
pub mod models;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store request failed ({status}): {body}")]
    Request { status: u16, body: String },
}

#[derive(Clone)]
pub struct Store {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Store {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("relief-app/0.1")
            .build()?;

        Ok(Store {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn table(&self, name: &str) -> TableQuery {
        TableQuery {
            store: self.clone(),
            url: format!("{}/rest/v1/{}", self.base_url, name),
            params: Vec::new(),
            order: Vec::new(),
            limit: None,
            on_conflict: None,
        }
    }

    pub fn auth(&self) -> auth::AuthClient {
        auth::AuthClient::new(self.http.clone(), &self.base_url, &self.api_key)
    }

    /// Cheap reachability probe used by the status endpoint.
    pub async fn ping(&self) -> bool {
        self.http
            .get(format!("{}/rest/v1/", self.base_url))
            .header("apikey", &self.api_key)
            .send()
            .await
            .map(|r| r.status().is_success() || r.status().is_client_error())
            .unwrap_or(false)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

pub struct TableQuery {
    store: Store,
    url: String,
    params: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<u32>,
    on_conflict: Option<String>,
}

impl TableQuery {
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.into(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn neq(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.into(), format!("neq.{}", value.to_string())));
        self
    }

    pub fn lt(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.into(), format!("lt.{}", value.to_string())));
        self
    }

    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.params
            .push((column.into(), format!("ilike.{}", pattern)));
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.params.push((column.into(), "not.is.null".into()));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.params.push((column.into(), "is.null".into()));
        self
    }

    pub fn in_list(mut self, column: &str, values: &[impl ToString]) -> Self {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.params
            .push((column.into(), format!("in.({})", joined)));
        self
    }

    pub fn order(mut self, column: &str, descending: bool) -> Self {
        let dir = if descending { "desc" } else { "asc" };
        self.order.push(format!("{}.{}", column, dir));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn on_conflict(mut self, column: &str) -> Self {
        self.on_conflict = Some(column.to_string());
        self
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.params.clone();
        if !self.order.is_empty() {
            pairs.push(("order".into(), self.order.join(",")));
        }
        if let Some(n) = self.limit {
            pairs.push(("limit".into(), n.to_string()));
        }
        if let Some(col) = &self.on_conflict {
            pairs.push(("on_conflict".into(), col.clone()));
        }
        pairs
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, StoreError> {
        let req = self
            .store
            .authed(self.store.http.get(&self.url))
            .query(&self.query_pairs());
        let resp = req.send().await?;
        let resp = check(resp).await?;
        Ok(resp.json().await?)
    }

    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, StoreError> {
        let mut rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        self,
        body: &B,
    ) -> Result<Vec<T>, StoreError> {
        let req = self
            .store
            .authed(self.store.http.post(&self.url))
            .header("Prefer", "return=representation")
            .query(&self.query_pairs())
            .json(body);
        let resp = check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn upsert<B: Serialize, T: DeserializeOwned>(
        self,
        body: &B,
    ) -> Result<Vec<T>, StoreError> {
        let req = self
            .store
            .authed(self.store.http.post(&self.url))
            .header(
                "Prefer",
                "resolution=merge-duplicates,return=representation",
            )
            .query(&self.query_pairs())
            .json(body);
        let resp = check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn update<B: Serialize, T: DeserializeOwned>(
        self,
        patch: &B,
    ) -> Result<Vec<T>, StoreError> {
        let req = self
            .store
            .authed(self.store.http.patch(&self.url))
            .header("Prefer", "return=representation")
            .query(&self.query_pairs())
            .json(patch);
        let resp = check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn delete(self) -> Result<(), StoreError> {
        let req = self
            .store
            .authed(self.store.http.delete(&self.url))
            .query(&self.query_pairs());
        check(req.send().await?).await?;
        Ok(())
    }

    /// Exact row count without pulling the table down.
    pub async fn count(self) -> Result<u64, StoreError> {
        let store = self.store.clone();
        let url = self.url.clone();
        let pairs = self.limit(1).query_pairs();
        let req = store
            .authed(store.http.get(&url))
            .header("Prefer", "count=exact")
            .query(&pairs);
        let resp = check(req.send().await?).await?;
        let total = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(total)
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Request {
        status: status.as_u16(),
        body,
    })
}
