// libs/appointment-cell/src/services/conflict.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::StoreError;

use crate::models::{AppointmentError, Booking, BookingMode, BookingStatus, Slot, SlotKey};
use crate::services::store::BookingStore;

/// One async lock per slot key, created on demand. Entries nobody holds
/// are pruned on the next acquisition.
#[derive(Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<SlotKey, Arc<AsyncMutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &SlotKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|k, l| k == key || Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub slot: Slot,
    pub patient_id: Uuid,
    pub mode: BookingMode,
    pub reason: Option<String>,
    pub fee_cents: Option<u64>,
}

/// Serializes reservations per slot so that check-then-insert is atomic
/// within this process; the store's uniqueness guard covers the rest.
pub struct ConflictResolver {
    store: Arc<dyn BookingStore>,
    locks: SlotLocks,
}

impl ConflictResolver {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self {
            store,
            locks: SlotLocks::new(),
        }
    }

    pub async fn is_held(&self, key: &SlotKey) -> Result<bool, AppointmentError> {
        Ok(self.store.active_for_slot(key).await?.is_some())
    }

    /// Creates a pending booking, or fails with `SlotUnavailable` when an
    /// active booking already holds the slot.
    #[instrument(skip(self, request), fields(slot = %request.slot.key()))]
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Booking, AppointmentError> {
        let key = request.slot.key();
        let _guard = self.locks.acquire(&key).await;

        if let Some(existing) = self.store.active_for_slot(&key).await? {
            debug!("Slot {} already held by booking {}", key, existing.id);
            return Err(AppointmentError::SlotUnavailable(key));
        }

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            slot: request.slot,
            patient_id: request.patient_id,
            mode: request.mode,
            reason: request.reason,
            status: BookingStatus::Pending,
            fee_cents: request.fee_cents,
            cancellation_reason: None,
            history: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert(booking).await {
            Ok(stored) => {
                info!("Reserved slot {} as booking {}", key, stored.id);
                Ok(stored)
            }
            Err(StoreError::AlreadyExists(reason)) => {
                warn!("Slot {} taken concurrently: {}", key, reason);
                Err(AppointmentError::SlotUnavailable(key))
            }
            Err(e) => Err(e.into()),
        }
    }
}
