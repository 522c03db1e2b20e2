// libs/order-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_database::{Record, StoreError};
use shared_models::billing::BillingNotice;
use shared_models::lifecycle::TransitionError;

// ==============================================================================
// ORDER LIFECYCLE TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Confirmed => write!(f, "confirmed"),
            OrderStatus::Preparing => write!(f, "preparing"),
            OrderStatus::Ready => write!(f, "ready"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    Confirm,
    Prepare,
    MarkReady,
    Complete,
    Cancel,
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderEvent::Confirm => write!(f, "confirm"),
            OrderEvent::Prepare => write!(f, "prepare"),
            OrderEvent::MarkReady => write!(f, "mark_ready"),
            OrderEvent::Complete => write!(f, "complete"),
            OrderEvent::Cancel => write!(f, "cancel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum OrderActor {
    Patient(Uuid),
    Pharmacy(Uuid),
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub event: OrderEvent,
    pub actor: OrderActor,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

// ==============================================================================
// ORDER
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

impl OrderItem {
    pub fn line_total_cents(&self) -> u64 {
        self.unit_price_cents.saturating_mul(u64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub pharmacy_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_cents: u64,
    pub status: OrderStatus,
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub history: Vec<OrderStatusChange>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Order {
    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub pharmacy_id: Uuid,
    pub items: Vec<OrderItem>,
    /// Admins may place an order for a patient; ignored for everyone else.
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub event: OrderEvent,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderUpdate {
    pub order: Order,
    pub billing: Option<BillingNotice>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Order has no items")]
    EmptyOrder,

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Cannot apply '{event}' to an order in state '{from}'")]
    InvalidTransition { from: String, event: String },

    #[error("Order is in terminal state '{state}'")]
    TerminalStateViolation { state: String },

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Order {0} not found")]
    NotFound(Uuid),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<TransitionError> for OrderError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { from, event } => {
                OrderError::InvalidTransition { from, event }
            }
            TransitionError::TerminalStateViolation { state } => {
                OrderError::TerminalStateViolation { state }
            }
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrderError::NotFound(id),
            StoreError::VersionMismatch { .. } | StoreError::AlreadyExists(_) => {
                OrderError::Conflict(err.to_string())
            }
            StoreError::Backend(msg) => OrderError::Storage(msg),
        }
    }
}
