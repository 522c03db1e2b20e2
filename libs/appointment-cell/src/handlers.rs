// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::{AppError, CodedError};

use crate::models::{
    Actor, AppointmentError, BookAppointmentRequest, BookingRequest, Slot, SlotQuery,
    UpdateStatusRequest,
};
use crate::services::scheduling::SchedulingService;

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

impl From<AppointmentError> for CodedError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::InvalidHorizon(_) => {
                CodedError::new("invalid_horizon", AppError::BadRequest(message))
            }
            AppointmentError::InvalidSlot(_) => {
                CodedError::new("invalid_slot", AppError::BadRequest(message))
            }
            AppointmentError::ValidationError(_) => {
                CodedError::new("validation", AppError::ValidationError(message))
            }
            AppointmentError::SlotUnavailable(_) => {
                CodedError::new("slot_unavailable", AppError::Conflict(message))
            }
            AppointmentError::Conflict(_) => {
                CodedError::new("conflict", AppError::Conflict(message))
            }
            AppointmentError::InvalidTransition { .. } => {
                CodedError::new("invalid_transition", AppError::Unprocessable(message))
            }
            AppointmentError::TerminalStateViolation { .. } => {
                CodedError::new("terminal_state_violation", AppError::Unprocessable(message))
            }
            AppointmentError::NotFound(_) => {
                CodedError::new("not_found", AppError::NotFound(message))
            }
            AppointmentError::Unauthorized(_) => {
                CodedError::new("unauthorized", AppError::Forbidden(message))
            }
            AppointmentError::Storage(_) => {
                CodedError::new("storage", AppError::Database(message))
            }
        }
    }
}

/// Maps the authenticated caller onto a lifecycle actor. Tokens without a
/// recognised role are treated as patients.
pub fn actor_for(user: &User) -> Result<Actor, AppError> {
    if user.is_admin() {
        return Ok(Actor::Admin);
    }

    let id = user
        .uuid()
        .ok_or_else(|| AppError::Auth(format!("subject '{}' is not a valid id", user.id)))?;

    match user.role() {
        Some(Role::Doctor) | Some(Role::Pharmacy) => Ok(Actor::Provider(id)),
        _ => Ok(Actor::Patient(id)),
    }
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_slots(
    State(service): State<Arc<SchedulingService>>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, CodedError> {
    let slots: Vec<Slot> = service.list_slots(provider_id, query).await?.collect();

    Ok(Json(json!({
        "provider_id": provider_id,
        "slots": slots,
        "total": slots.len(),
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, CodedError> {
    let patient_id = match actor_for(&user)? {
        Actor::Admin => request.patient_id.ok_or_else(|| {
            AppError::BadRequest("patient_id is required when booking as admin".to_string())
        })?,
        Actor::Patient(id) | Actor::Provider(id) => id,
    };

    let booking = service
        .book(BookingRequest {
            provider_id: request.provider_id,
            date: request.date,
            start_time: request.time,
            patient_id,
            mode: request.mode,
            reason: request.reason,
        })
        .await?;

    Ok(Json(json!({
        "booking_id": booking.id,
        "status": booking.status,
        "booking": booking,
    })))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, CodedError> {
    let booking = service.get_booking(booking_id, actor_for(&user)?).await?;
    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn update_booking_status(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, CodedError> {
    let actor = actor_for(&user)?;
    debug!("{:?} requested '{}' on booking {}", actor, request.event, booking_id);

    let update = service
        .update_status(booking_id, request.event, actor, request.reason)
        .await?;

    Ok(Json(json!({
        "status": update.booking.status,
        "booking": update.booking,
        "billing": update.billing,
    })))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_patient_bookings(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, CodedError> {
    match actor_for(&user)? {
        Actor::Admin => {}
        Actor::Patient(id) if id == patient_id => {}
        _ => {
            return Err(AppError::Forbidden(
                "Not authorized to view this patient's bookings".to_string(),
            )
            .into())
        }
    }

    let bookings = service.list_patient_bookings(patient_id).await?;
    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_provider_bookings(
    State(service): State<Arc<SchedulingService>>,
    Extension(user): Extension<User>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, CodedError> {
    match actor_for(&user)? {
        Actor::Admin => {}
        Actor::Provider(id) if id == provider_id => {}
        _ => {
            return Err(AppError::Forbidden(
                "Not authorized to view this provider's bookings".to_string(),
            )
            .into())
        }
    }

    let bookings = service.list_provider_bookings(provider_id).await?;
    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len(),
    })))
}
