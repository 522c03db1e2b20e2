// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use shared_database::{Record, StoreError};
use shared_models::billing::BillingNotice;
use shared_models::lifecycle::TransitionError;
use provider_cell::ProviderError;

// ==============================================================================
// SLOTS
// ==============================================================================

/// A candidate unit of provider availability. Only becomes real once a
/// booking holds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
}

impl Slot {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            provider_id: self.provider_id,
            date: self.date,
            start_time: self.start_time,
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Exclusivity key: at most one active booking per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}", self.provider_id, self.date, self.start_time.format("%H:%M"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    pub start: NaiveDate,
    pub days: u32,
    pub granularity_minutes: u32,
}

impl Horizon {
    /// Exclusive upper bound, saturating at the last representable date.
    pub fn end(&self) -> NaiveDate {
        self.checked_end().unwrap_or(NaiveDate::MAX)
    }

    pub fn checked_end(&self) -> Option<NaiveDate> {
        self.start.checked_add_days(Days::new(u64::from(self.days)))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end()
    }
}

// ==============================================================================
// BOOKING LIFECYCLE TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Active bookings hold their slot.
    pub fn is_active(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEvent {
    Confirm,
    Cancel,
    Complete,
}

impl fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingEvent::Confirm => write!(f, "confirm"),
            BookingEvent::Cancel => write!(f, "cancel"),
            BookingEvent::Complete => write!(f, "complete"),
        }
    }
}

impl FromStr for BookingEvent {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirm" => Ok(BookingEvent::Confirm),
            "cancel" => Ok(BookingEvent::Cancel),
            "complete" | "done" => Ok(BookingEvent::Complete),
            other => Err(AppointmentError::ValidationError(format!(
                "unknown booking event '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingMode {
    #[serde(alias = "remote", alias = "video")]
    Online,
    #[serde(alias = "in-person", alias = "offline")]
    InPerson,
}

impl fmt::Display for BookingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingMode::Online => write!(f, "online"),
            BookingMode::InPerson => write!(f, "in_person"),
        }
    }
}

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Patient(Uuid),
    Provider(Uuid),
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub event: BookingEvent,
    pub actor: Actor,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    #[serde(flatten)]
    pub slot: Slot,
    pub patient_id: Uuid,
    pub mode: BookingMode,
    pub reason: Option<String>,
    pub status: BookingStatus,
    pub fee_cents: Option<u64>,
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn provider_id(&self) -> Uuid {
        self.slot.provider_id
    }

    pub fn holds(&self, key: &SlotKey) -> bool {
        self.status.is_active() && self.slot.key() == *key
    }
}

impl Record for Booking {
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

/// Horizon overrides for a slot listing; unset fields come from config and
/// the provider's slot length.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotQuery {
    pub start: Option<NaiveDate>,
    pub days: Option<u32>,
    pub granularity_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub patient_id: Uuid,
    pub mode: BookingMode,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub mode: BookingMode,
    pub reason: Option<String>,
    /// Admins may book on behalf of a patient; ignored for everyone else.
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub event: BookingEvent,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub booking: Booking,
    pub billing: Option<BillingNotice>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid horizon: {0}")]
    InvalidHorizon(String),

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Slot {0} is no longer available")]
    SlotUnavailable(SlotKey),

    #[error("Cannot apply '{event}' to a booking in state '{from}'")]
    InvalidTransition { from: String, event: String },

    #[error("Booking is in terminal state '{state}'")]
    TerminalStateViolation { state: String },

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<TransitionError> for AppointmentError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { from, event } => {
                AppointmentError::InvalidTransition { from, event }
            }
            TransitionError::TerminalStateViolation { state } => {
                AppointmentError::TerminalStateViolation { state }
            }
        }
    }
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppointmentError::NotFound(format!("booking {}", id)),
            StoreError::VersionMismatch { .. } | StoreError::AlreadyExists(_) => {
                AppointmentError::Conflict(err.to_string())
            }
            StoreError::Backend(msg) => AppointmentError::Storage(msg),
        }
    }
}

impl From<ProviderError> for AppointmentError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(id) => AppointmentError::NotFound(format!("provider {}", id)),
            ProviderError::InvalidCoordinate(msg) => AppointmentError::ValidationError(msg),
            ProviderError::Directory(msg) => AppointmentError::Storage(msg),
        }
    }
}
