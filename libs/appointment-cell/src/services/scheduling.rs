// libs/appointment-cell/src/services/scheduling.rs
use std::sync::Arc;

use chrono::{Days, Local, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use provider_cell::{Coordinate, Provider, ProviderFilter, ProviderSearchService, Ranked};
use shared_config::SchedulingConfig;
use shared_database::StoreError;
use shared_models::billing::{BillableKind, BillingNotice};

use crate::models::{
    Actor, AppointmentError, Booking, BookingEvent, BookingRequest, BookingStatus, Horizon,
    Slot, SlotQuery, StatusUpdate,
};
use crate::services::conflict::{ConflictResolver, ReservationRequest};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::slots::{SlotCandidates, SlotGenerator};
use crate::services::store::BookingStore;

/// Local wall-clock time used to reject slots that have already started.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Entry point for discovery, slot listing, booking and status changes.
pub struct SchedulingService {
    config: SchedulingConfig,
    providers: Arc<ProviderSearchService>,
    store: Arc<dyn BookingStore>,
    resolver: ConflictResolver,
    lifecycle: AppointmentLifecycleService,
    slots: SlotGenerator,
    now: Clock,
}

impl SchedulingService {
    pub fn new(
        config: &SchedulingConfig,
        providers: Arc<ProviderSearchService>,
        store: Arc<dyn BookingStore>,
    ) -> Self {
        Self {
            config: config.clone(),
            resolver: ConflictResolver::new(Arc::clone(&store)),
            lifecycle: AppointmentLifecycleService::new(),
            slots: SlotGenerator::new(config.max_horizon_days),
            providers,
            store,
            now: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Replaces the source of "now", mainly for tests.
    pub fn with_clock(mut self, now: Clock) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.now)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    fn booking_limit(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(self.config.max_horizon_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn providers(&self) -> &ProviderSearchService {
        &self.providers
    }

    pub async fn find_providers(
        &self,
        reference: Option<Coordinate>,
        filter: &ProviderFilter,
    ) -> Result<Vec<Ranked<Provider>>, AppointmentError> {
        Ok(self.providers.find_providers(reference, filter).await?)
    }

    fn slot_minutes(&self, provider: &Provider) -> u32 {
        if provider.slot_minutes == 0 {
            self.config.default_slot_minutes
        } else {
            provider.slot_minutes
        }
    }

    /// Fills unset query fields from config. The granularity, when given,
    /// must equal the provider's slot length so every listed slot is bookable.
    pub fn resolve_horizon(
        &self,
        provider: &Provider,
        query: &SlotQuery,
    ) -> Result<Horizon, AppointmentError> {
        let slot_minutes = self.slot_minutes(provider);
        if let Some(granularity) = query.granularity_minutes {
            if granularity != slot_minutes {
                return Err(AppointmentError::InvalidHorizon(format!(
                    "provider {} books {}-minute slots, not {}-minute slots",
                    provider.id, slot_minutes, granularity
                )));
            }
        }

        let start = match query.start {
            Some(start) => start,
            None => self
                .today()
                .checked_add_days(Days::new(u64::from(self.config.horizon_start_offset_days)))
                .ok_or_else(|| {
                    AppointmentError::InvalidHorizon("default start is out of range".to_string())
                })?,
        };

        Ok(Horizon {
            start,
            days: query.days.unwrap_or(self.config.horizon_days),
            granularity_minutes: slot_minutes,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_slots(
        &self,
        provider_id: Uuid,
        query: SlotQuery,
    ) -> Result<SlotCandidates, AppointmentError> {
        let provider = self.providers.get_provider(provider_id).await?;
        let horizon = self.resolve_horizon(&provider, &query)?;
        let now = self.now();
        self.slots.validate(&provider, &horizon, now)?;

        let held = self
            .store
            .list_for_provider(provider_id, Some((horizon.start, horizon.end())))
            .await?;

        self.slots.generate(&provider, &horizon, &held, now)
    }

    fn validate_slot(&self, provider: &Provider, request: &BookingRequest) -> Result<Slot, AppointmentError> {
        let now = self.now();
        let today = now.date();
        let minutes = self.slot_minutes(provider);
        let hours = &provider.operating_hours;

        if request.date < today {
            return Err(AppointmentError::InvalidSlot(format!(
                "{} is in the past",
                request.date
            )));
        }
        if request.date >= self.booking_limit(today) {
            return Err(AppointmentError::InvalidSlot(format!(
                "{} is beyond the {}-day booking horizon",
                request.date, self.config.max_horizon_days
            )));
        }
        if !hours.is_open_on(request.date) {
            return Err(AppointmentError::InvalidSlot(format!(
                "provider {} is closed on {}",
                provider.id, request.date
            )));
        }
        if !hours.is_slot_start(request.start_time, minutes) {
            return Err(AppointmentError::InvalidSlot(format!(
                "{} is not a {}-minute slot within {}-{}",
                request.start_time.format("%H:%M"),
                minutes,
                hours.open.format("%H:%M"),
                hours.close.format("%H:%M")
            )));
        }

        let slot = Slot {
            provider_id: provider.id,
            date: request.date,
            start_time: request.start_time,
            duration_minutes: minutes,
        };
        if slot.starts_at() < now {
            return Err(AppointmentError::InvalidSlot(format!(
                "{} {} has already started",
                request.date,
                request.start_time.format("%H:%M")
            )));
        }
        Ok(slot)
    }

    #[instrument(skip(self, request), fields(provider_id = %request.provider_id, date = %request.date))]
    pub async fn book(&self, request: BookingRequest) -> Result<Booking, AppointmentError> {
        let provider = self.providers.get_provider(request.provider_id).await?;
        if !provider.is_available {
            warn!("Booking attempted against unavailable provider {}", provider.id);
            return Err(AppointmentError::NotFound(format!(
                "provider {} is not accepting bookings",
                provider.id
            )));
        }

        let slot = self.validate_slot(&provider, &request)?;
        self.resolver
            .reserve(ReservationRequest {
                slot,
                patient_id: request.patient_id,
                mode: request.mode,
                reason: request.reason,
                fee_cents: provider.consultation_fee_cents,
            })
            .await
    }

    /// Applies `event` under compare-and-swap. A lost race is retried once
    /// against the fresh state; losing twice yields `Conflict`.
    #[instrument(skip(self, reason))]
    pub async fn update_status(
        &self,
        booking_id: Uuid,
        event: BookingEvent,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<StatusUpdate, AppointmentError> {
        let mut retried = false;

        loop {
            let current = self.load(booking_id).await?;
            let updated = self
                .lifecycle
                .apply(&current, event, actor, reason.clone(), Utc::now())?;

            match self
                .store
                .compare_and_swap(booking_id, current.version, updated)
                .await
            {
                Ok(saved) => {
                    let billing = Self::billing_notice(&saved);
                    return Ok(StatusUpdate {
                        booking: saved,
                        billing,
                    });
                }
                Err(StoreError::VersionMismatch { expected, actual }) if !retried => {
                    debug!(
                        "Booking {} changed underneath us ({} -> {}), re-validating",
                        booking_id, expected, actual
                    );
                    retried = true;
                }
                Err(StoreError::VersionMismatch { .. }) => {
                    warn!("Booking {} lost the status race twice", booking_id);
                    return Err(AppointmentError::Conflict(format!(
                        "booking {} was modified concurrently",
                        booking_id
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn billing_notice(booking: &Booking) -> Option<BillingNotice> {
        if booking.status != BookingStatus::Confirmed {
            return None;
        }
        let amount_cents = booking.fee_cents?;
        info!("Booking {} is billable: {} cents", booking.id, amount_cents);

        Some(BillingNotice {
            kind: BillableKind::Appointment,
            subject_id: booking.id,
            payer_id: booking.patient_id,
            status: booking.status.to_string(),
            amount_cents,
            emitted_at: Utc::now(),
        })
    }

    async fn load(&self, booking_id: Uuid) -> Result<Booking, AppointmentError> {
        self.store
            .get(booking_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("booking {}", booking_id)))
    }

    /// Visible to admins, the booking's patient and its provider.
    pub async fn get_booking(&self, booking_id: Uuid, actor: Actor) -> Result<Booking, AppointmentError> {
        let booking = self.load(booking_id).await?;
        let visible = match actor {
            Actor::Admin => true,
            Actor::Patient(id) => id == booking.patient_id,
            Actor::Provider(id) => id == booking.provider_id(),
        };

        if !visible {
            return Err(AppointmentError::Unauthorized(format!(
                "booking {} belongs to someone else",
                booking_id
            )));
        }
        Ok(booking)
    }

    pub async fn list_patient_bookings(&self, patient_id: Uuid) -> Result<Vec<Booking>, AppointmentError> {
        Ok(self.store.list_for_patient(patient_id).await?)
    }

    pub async fn list_provider_bookings(&self, provider_id: Uuid) -> Result<Vec<Booking>, AppointmentError> {
        Ok(self.store.list_for_provider(provider_id, None).await?)
    }
}
