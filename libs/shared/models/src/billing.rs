use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillableKind {
    Appointment,
    Order,
}

/// Handed to the payment subsystem when an entity becomes billable. The
/// scheduling core never captures or verifies payment itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingNotice {
    pub kind: BillableKind,
    pub subject_id: Uuid,
    pub payer_id: Uuid,
    pub status: String,
    pub amount_cents: u64,
    pub emitted_at: DateTime<Utc>,
}
