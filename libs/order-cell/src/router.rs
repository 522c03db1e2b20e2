// libs/order-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::orders::OrderService;

pub fn order_routes(config: Arc<AppConfig>, service: Arc<OrderService>) -> Router {
    Router::new()
        .route("/", post(handlers::create_order))
        .route("/{order_id}", get(handlers::get_order))
        .route("/{order_id}/status", post(handlers::update_order_status))
        .route("/patients/{patient_id}", get(handlers::get_patient_orders))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
