use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Provider, ProviderError, ProviderFilter};

/// Read-only source of provider records.
///
/// Implementations may pre-filter on `filter` where their backend makes that
/// cheap; callers still re-apply the filter, so ignoring it is always correct.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, ProviderError>;

    async fn list_providers(&self, filter: &ProviderFilter) -> Result<Vec<Provider>, ProviderError>;
}

pub struct InMemoryProviderDirectory {
    providers: Vec<Provider>,
}

impl InMemoryProviderDirectory {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    /// Loads a JSON array of providers, e.g. a seed file for local runs.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading provider directory {}", path.display()))?;
        let providers: Vec<Provider> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing provider directory {}", path.display()))?;

        info!("Loaded {} providers from {}", providers.len(), path.display());
        Ok(Self::new(providers))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl ProviderDirectory for InMemoryProviderDirectory {
    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, ProviderError> {
        Ok(self.providers.iter().find(|p| p.id == provider_id).cloned())
    }

    async fn list_providers(&self, filter: &ProviderFilter) -> Result<Vec<Provider>, ProviderError> {
        Ok(self
            .providers
            .iter()
            .filter(|p| filter.admits(p))
            .cloned()
            .collect())
    }
}

pub struct SupabaseProviderDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseProviderDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn list_path(filter: &ProviderFilter) -> String {
        let mut query_parts = vec!["order=display_name.asc".to_string()];

        if let Some(kind) = filter.kind {
            query_parts.push(format!("kind=eq.{}", kind));
        }
        if filter.available_only {
            query_parts.push("is_available=eq.true".to_string());
        }
        if let Some(text) = filter.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = urlencoding::encode(text);
            query_parts.push(format!(
                "or=(display_name.ilike.*{0}*,specialty.ilike.*{0}*)",
                pattern
            ));
        }

        format!("/rest/v1/providers?{}", query_parts.join("&"))
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Provider>, ProviderError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Provider>, _>>()
            .map_err(|e| ProviderError::Directory(format!("Failed to parse providers: {}", e)))
    }
}

#[async_trait]
impl ProviderDirectory for SupabaseProviderDirectory {
    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, ProviderError> {
        debug!("Fetching provider {}", provider_id);

        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| ProviderError::Directory(e.to_string()))?;

        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn list_providers(&self, filter: &ProviderFilter) -> Result<Vec<Provider>, ProviderError> {
        let path = Self::list_path(filter);
        debug!("Listing providers via {}", path);

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| ProviderError::Directory(e.to_string()))?;

        Self::parse_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderKind;

    #[test]
    fn list_path_encodes_text_filter() {
        let filter = ProviderFilter {
            text: Some("heart care".to_string()),
            kind: Some(ProviderKind::Pharmacy),
            available_only: true,
            max_distance_km: None,
        };

        let path = SupabaseProviderDirectory::list_path(&filter);
        assert!(path.starts_with("/rest/v1/providers?order=display_name.asc"));
        assert!(path.contains("kind=eq.pharmacy"));
        assert!(path.contains("is_available=eq.true"));
        assert!(path.contains("display_name.ilike.*heart%20care*"));
    }

    #[test]
    fn list_path_without_filters() {
        let path = SupabaseProviderDirectory::list_path(&ProviderFilter::default());
        assert_eq!(path, "/rest/v1/providers?order=display_name.asc");
    }
}
