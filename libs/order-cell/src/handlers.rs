// libs/order-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::{AppError, CodedError};

use crate::models::{CreateOrderRequest, OrderActor, OrderError, UpdateOrderStatusRequest};
use crate::services::orders::OrderService;

impl From<OrderError> for CodedError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::EmptyOrder | OrderError::InvalidItem(_) => {
                CodedError::new("invalid_order", AppError::BadRequest(message))
            }
            OrderError::InvalidTransition { .. } => {
                CodedError::new("invalid_transition", AppError::Unprocessable(message))
            }
            OrderError::TerminalStateViolation { .. } => {
                CodedError::new("terminal_state_violation", AppError::Unprocessable(message))
            }
            OrderError::Conflict(_) => CodedError::new("conflict", AppError::Conflict(message)),
            OrderError::NotFound(_) => CodedError::new("not_found", AppError::NotFound(message)),
            OrderError::Unauthorized(_) => {
                CodedError::new("unauthorized", AppError::Forbidden(message))
            }
            OrderError::Storage(_) => CodedError::new("storage", AppError::Database(message)),
        }
    }
}

fn order_actor(user: &User) -> Result<OrderActor, AppError> {
    if user.is_admin() {
        return Ok(OrderActor::Admin);
    }

    let id = user
        .uuid()
        .ok_or_else(|| AppError::Auth(format!("subject '{}' is not a valid id", user.id)))?;

    match user.role() {
        Some(Role::Pharmacy) => Ok(OrderActor::Pharmacy(id)),
        _ => Ok(OrderActor::Patient(id)),
    }
}

#[axum::debug_handler]
pub async fn create_order(
    State(service): State<Arc<OrderService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Value>, CodedError> {
    let patient_id = match order_actor(&user)? {
        OrderActor::Admin => request.patient_id.ok_or_else(|| {
            AppError::BadRequest("patient_id is required when ordering as admin".to_string())
        })?,
        OrderActor::Patient(id) => id,
        OrderActor::Pharmacy(_) => {
            return Err(AppError::Forbidden("Pharmacies cannot place orders".to_string()).into())
        }
    };

    let order = service
        .create_order(patient_id, request.pharmacy_id, request.items)
        .await?;

    Ok(Json(json!({
        "order_id": order.id,
        "status": order.status,
        "order": order,
    })))
}

#[axum::debug_handler]
pub async fn get_order(
    State(service): State<Arc<OrderService>>,
    Extension(user): Extension<User>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Value>, CodedError> {
    let order = service.get_order(order_id, order_actor(&user)?).await?;
    Ok(Json(json!(order)))
}

#[axum::debug_handler]
pub async fn update_order_status(
    State(service): State<Arc<OrderService>>,
    Extension(user): Extension<User>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Value>, CodedError> {
    let update = service
        .update_status(order_id, request.event, order_actor(&user)?, request.reason)
        .await?;

    Ok(Json(json!({
        "status": update.order.status,
        "order": update.order,
        "billing": update.billing,
    })))
}

#[axum::debug_handler]
pub async fn get_patient_orders(
    State(service): State<Arc<OrderService>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, CodedError> {
    match order_actor(&user)? {
        OrderActor::Admin => {}
        OrderActor::Patient(id) if id == patient_id => {}
        _ => {
            return Err(AppError::Forbidden(
                "Not authorized to view this patient's orders".to_string(),
            )
            .into())
        }
    }

    let orders = service.list_patient_orders(patient_id).await?;
    Ok(Json(json!({
        "orders": orders,
        "total": orders.len(),
    })))
}
