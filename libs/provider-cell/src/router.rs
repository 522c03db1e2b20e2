use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::search::ProviderSearchService;

pub fn provider_routes(config: Arc<AppConfig>, service: Arc<ProviderSearchService>) -> Router {
    Router::new()
        .route("/", get(handlers::search_providers))
        .route("/{provider_id}", get(handlers::get_provider))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
