// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use shared_database::{MemoryTable, StoreError, SupabaseClient, SupabaseTable};

use crate::models::{Booking, SlotKey};

/// Persistence for bookings.
///
/// `insert` must reject a booking whose slot already has an active booking,
/// atomically with respect to other inserts. Listings come back in
/// chronological slot order.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn active_for_slot(&self, key: &SlotKey) -> Result<Option<Booking>, StoreError>;

    /// `range` is `[from, to)` on the slot date.
    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    async fn insert(&self, booking: Booking) -> Result<Booking, StoreError>;

    async fn put(&self, booking: Booking) -> Result<Booking, StoreError>;

    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: u64,
        booking: Booking,
    ) -> Result<Booking, StoreError>;
}

fn chronological(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by(|a, b| {
        a.slot
            .starts_at()
            .cmp(&b.slot.starts_at())
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    bookings
}

#[derive(Default)]
pub struct MemoryBookingStore {
    table: MemoryTable<Booking>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.table.is_empty().await
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.table.get(id).await)
    }

    async fn active_for_slot(&self, key: &SlotKey) -> Result<Option<Booking>, StoreError> {
        Ok(self.table.scan(|b| b.holds(key)).await.into_iter().next())
    }

    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = self
            .table
            .scan(|b| {
                b.provider_id() == provider_id
                    && range.map_or(true, |(from, to)| b.slot.date >= from && b.slot.date < to)
            })
            .await;
        Ok(chronological(rows))
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        Ok(chronological(self.table.scan(|b| b.patient_id == patient_id).await))
    }

    async fn insert(&self, booking: Booking) -> Result<Booking, StoreError> {
        let key = booking.slot.key();
        let active = booking.status.is_active();
        self.table
            .insert_unless(booking, |existing| active && existing.holds(&key))
            .await
    }

    async fn put(&self, booking: Booking) -> Result<Booking, StoreError> {
        Ok(self.table.put(booking).await)
    }

    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: u64,
        booking: Booking,
    ) -> Result<Booking, StoreError> {
        self.table.compare_and_swap(id, expected_version, booking).await
    }
}

/// Bookings in the `appointment_bookings` table. Slot exclusivity relies on
/// a partial unique index over `(provider_id, date, start_time)` where
/// `status <> 'cancelled'`.
pub struct SupabaseBookingStore {
    table: SupabaseTable<Booking>,
}

impl SupabaseBookingStore {
    pub const TABLE: &'static str = "appointment_bookings";

    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            table: SupabaseTable::new(supabase, Self::TABLE),
        }
    }
}

#[async_trait]
impl BookingStore for SupabaseBookingStore {
    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        self.table.get(id).await
    }

    async fn active_for_slot(&self, key: &SlotKey) -> Result<Option<Booking>, StoreError> {
        let rows = self
            .table
            .select(&[
                ("provider_id", format!("eq.{}", key.provider_id)),
                ("date", format!("eq.{}", key.date)),
                ("start_time", format!("eq.{}", key.start_time.format("%H:%M:%S"))),
                ("status", "neq.cancelled".to_string()),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut filters = vec![
            ("provider_id", format!("eq.{}", provider_id)),
            ("order", "date.asc,start_time.asc".to_string()),
        ];
        if let Some((from, to)) = range {
            filters.push(("date", format!("gte.{}", from)));
            filters.push(("date", format!("lt.{}", to)));
        }

        debug!("Listing bookings for provider {}", provider_id);
        Ok(chronological(self.table.select(&filters).await?))
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = self
            .table
            .select(&[
                ("patient_id", format!("eq.{}", patient_id)),
                ("order", "date.asc,start_time.asc".to_string()),
            ])
            .await?;
        Ok(chronological(rows))
    }

    async fn insert(&self, booking: Booking) -> Result<Booking, StoreError> {
        self.table.insert(booking).await
    }

    async fn put(&self, booking: Booking) -> Result<Booking, StoreError> {
        self.table.put(booking).await
    }

    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: u64,
        booking: Booking,
    ) -> Result<Booking, StoreError> {
        self.table.compare_and_swap(id, expected_version, booking).await
    }
}
