use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::store::{Record, StoreError};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key)
                .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Fall back to the service key so server-side calls pass RLS.
        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => DatabaseError::Auth(error_text),
                404 => DatabaseError::NotFound(error_text),
                409 => DatabaseError::Conflict(error_text),
                code => DatabaseError::Api {
                    status: code,
                    message: error_text,
                },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

/// A PostgREST table of versioned records keyed by `id`.
///
/// Uniqueness beyond the primary key is left to the database (partial unique
/// indexes); a 409 from PostgREST surfaces as [`StoreError::AlreadyExists`].
pub struct SupabaseTable<R> {
    client: Arc<SupabaseClient>,
    table: String,
    _record: PhantomData<fn() -> R>,
}

impl<R> SupabaseTable<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    pub fn new(client: Arc<SupabaseClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            _record: PhantomData,
        }
    }

    fn path(&self, query: &str) -> String {
        if query.is_empty() {
            format!("/rest/v1/{}", self.table)
        } else {
            format!("/rest/v1/{}?{}", self.table, query)
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        let rows = self.select(&[("id", format!("eq.{}", id))]).await?;
        Ok(rows.into_iter().next())
    }

    /// `filters` are PostgREST column filters, e.g. `("status", "neq.cancelled")`.
    pub async fn select(&self, filters: &[(&str, String)]) -> Result<Vec<R>, StoreError> {
        let query = filters
            .iter()
            .map(|(column, filter)| format!("{}={}", column, filter))
            .collect::<Vec<_>>()
            .join("&");

        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &self.path(&query), None, None)
            .await?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<R>, _>>()
            .map_err(|e| StoreError::Backend(format!("Failed to parse {} rows: {}", self.table, e)))
    }

    pub async fn insert(&self, record: R) -> Result<R, StoreError> {
        let body = serde_json::to_value(&record)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                &self.path(""),
                None,
                Some(body),
                Some(return_representation()),
            )
            .await?;

        self.first_row(rows)?
            .ok_or_else(|| StoreError::Backend(format!("insert into {} returned no row", self.table)))
    }

    pub async fn put(&self, record: R) -> Result<R, StoreError> {
        let body = serde_json::to_value(&record)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let rows: Vec<Value> = self
            .client
            .request_with_headers(Method::POST, &self.path(""), None, Some(body), Some(headers))
            .await?;

        self.first_row(rows)?
            .ok_or_else(|| StoreError::Backend(format!("upsert into {} returned no row", self.table)))
    }

    /// Conditional update filtered on `version=eq.{expected}`; an empty
    /// result means another writer got there first.
    pub async fn compare_and_swap(
        &self,
        id: Uuid,
        expected: u64,
        mut record: R,
    ) -> Result<R, StoreError> {
        record.set_version(expected + 1);
        let body = serde_json::to_value(&record)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let query = format!("id=eq.{}&version=eq.{}", id, expected);
        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &self.path(&query),
                None,
                Some(body),
                Some(return_representation()),
            )
            .await?;

        if let Some(updated) = self.first_row(rows)? {
            return Ok(updated);
        }

        match self.get(id).await? {
            None => Err(StoreError::NotFound(id)),
            Some(current) => Err(StoreError::VersionMismatch {
                expected,
                actual: current.version(),
            }),
        }
    }

    fn first_row(&self, rows: Vec<Value>) -> Result<Option<R>, StoreError> {
        rows.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StoreError::Backend(format!("Failed to parse {} row: {}", self.table, e)))
    }
}
