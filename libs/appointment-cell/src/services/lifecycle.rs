// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use shared_models::lifecycle::{Lifecycle, Transition};

use crate::models::{Actor, AppointmentError, Booking, BookingEvent, BookingStatus, StatusChange};

const BOOKING_TRANSITIONS: &[Transition<BookingStatus>] = &[
    Transition::new(BookingStatus::Pending, BookingEvent::Confirm, BookingStatus::Confirmed),
    Transition::new(BookingStatus::Pending, BookingEvent::Cancel, BookingStatus::Cancelled),
    Transition::new(BookingStatus::Confirmed, BookingEvent::Cancel, BookingStatus::Cancelled),
    Transition::new(BookingStatus::Confirmed, BookingEvent::Complete, BookingStatus::Completed),
];

impl Lifecycle for BookingStatus {
    type Event = BookingEvent;

    fn transitions() -> &'static [Transition<Self>] {
        BOOKING_TRANSITIONS
    }

    fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Admins may do anything. Patients may only cancel their own booking;
    /// the booked provider may issue any event.
    pub fn authorize(
        &self,
        booking: &Booking,
        event: BookingEvent,
        actor: Actor,
    ) -> Result<(), AppointmentError> {
        let allowed = match actor {
            Actor::Admin => true,
            Actor::Provider(id) => id == booking.provider_id(),
            Actor::Patient(id) => id == booking.patient_id && event == BookingEvent::Cancel,
        };

        if !allowed {
            warn!("{:?} may not '{}' booking {}", actor, event, booking.id);
            return Err(AppointmentError::Unauthorized(format!(
                "not permitted to {} booking {}",
                event, booking.id
            )));
        }
        Ok(())
    }

    /// Returns the updated booking; the caller persists it.
    pub fn apply(
        &self,
        booking: &Booking,
        event: BookingEvent,
        actor: Actor,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Booking, AppointmentError> {
        self.authorize(booking, event, actor)?;

        let from = booking.status;
        let to = from.apply(event)?;
        debug!("Booking {} {} -> {} via {}", booking.id, from, to, event);

        let mut updated = booking.clone();
        updated.status = to;
        updated.updated_at = at;
        if to == BookingStatus::Cancelled {
            updated.cancellation_reason = reason.clone();
        }
        updated.history.push(StatusChange {
            from,
            to,
            event,
            actor,
            reason,
            at,
        });

        info!("Booking {} is now {}", booking.id, to);
        Ok(updated)
    }

    pub fn permitted_events(&self, booking: &Booking, actor: Actor) -> Vec<BookingEvent> {
        booking
            .status
            .permitted_events()
            .into_iter()
            .filter(|event| self.authorize(booking, *event, actor).is_ok())
            .collect()
    }
}
