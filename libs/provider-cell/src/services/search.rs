use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::models::{Provider, ProviderError, ProviderFilter};
use crate::services::directory::ProviderDirectory;
use crate::services::ranker::{ProximityRanker, Ranked};

pub struct ProviderSearchService {
    directory: Arc<dyn ProviderDirectory>,
}

impl ProviderSearchService {
    pub fn new(directory: Arc<dyn ProviderDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> Arc<dyn ProviderDirectory> {
        Arc::clone(&self.directory)
    }

    /// Providers admitted by `filter`, nearest first when `reference` is set.
    #[instrument(skip(self))]
    pub async fn find_providers(
        &self,
        reference: Option<Coordinate>,
        filter: &ProviderFilter,
    ) -> Result<Vec<Ranked<Provider>>, ProviderError> {
        if let Some(point) = reference {
            if !point.is_valid() {
                return Err(ProviderError::InvalidCoordinate(format!(
                    "({}, {}) is outside WGS84 bounds",
                    point.latitude, point.longitude
                )));
            }
        }

        let candidates: Vec<Provider> = self
            .directory
            .list_providers(filter)
            .await?
            .into_iter()
            .filter(|p| filter.admits(p))
            .collect();

        let ranked = ProximityRanker::rank_within(reference, candidates, filter.max_distance_km);
        debug!("Provider search returned {} results", ranked.len());
        Ok(ranked)
    }

    pub async fn get_provider(&self, provider_id: Uuid) -> Result<Provider, ProviderError> {
        self.directory
            .get_provider(provider_id)
            .await?
            .ok_or(ProviderError::NotFound(provider_id))
    }
}
