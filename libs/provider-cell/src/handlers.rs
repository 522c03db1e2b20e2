use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::geo::Coordinate;
use crate::models::{ProviderError, ProviderFilter, ProviderKind};
use crate::services::search::ProviderSearchService;

#[derive(Debug, Deserialize)]
pub struct ProviderSearchQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub q: Option<String>,
    pub kind: Option<ProviderKind>,
    pub available_only: Option<bool>,
    pub max_distance_km: Option<f64>,
}

impl ProviderSearchQuery {
    pub fn reference_point(&self) -> Result<Option<Coordinate>, AppError> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok(Some(Coordinate::new(lat, lon))),
            (None, None) => Ok(None),
            _ => Err(AppError::BadRequest(
                "lat and lon must be supplied together".to_string(),
            )),
        }
    }

    pub fn filter(&self) -> ProviderFilter {
        ProviderFilter {
            text: self.q.clone(),
            kind: self.kind,
            available_only: self.available_only.unwrap_or(false),
            max_distance_km: self.max_distance_km,
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(_) => AppError::NotFound(err.to_string()),
            ProviderError::InvalidCoordinate(msg) => AppError::BadRequest(msg),
            ProviderError::Directory(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn search_providers(
    State(service): State<Arc<ProviderSearchService>>,
    Query(query): Query<ProviderSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let reference = query.reference_point()?;
    let providers = service.find_providers(reference, &query.filter()).await?;

    Ok(Json(json!({
        "providers": providers,
        "total": providers.len(),
        "ranked_by_distance": reference.is_some(),
    })))
}

#[axum::debug_handler]
pub async fn get_provider(
    State(service): State<Arc<ProviderSearchService>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let provider = service.get_provider(provider_id).await?;
    Ok(Json(json!(provider)))
}
