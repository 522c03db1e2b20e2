// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::scheduling::SchedulingService;

pub fn appointment_routes(config: Arc<AppConfig>, service: Arc<SchedulingService>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}/status", post(handlers::update_booking_status))
        .route("/providers/{provider_id}/slots", get(handlers::list_slots))
        .route("/providers/{provider_id}", get(handlers::get_provider_bookings))
        .route("/patients/{patient_id}", get(handlers::get_patient_bookings))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
