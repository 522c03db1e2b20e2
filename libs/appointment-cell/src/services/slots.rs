// libs/appointment-cell/src/services/slots.rs
use std::collections::HashSet;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use provider_cell::Provider;

use crate::models::{AppointmentError, Booking, Horizon, Slot, SlotKey};

/// Enumerates open slots for one provider over a date horizon.
pub struct SlotGenerator {
    max_horizon_days: u32,
}

impl SlotGenerator {
    pub fn new(max_horizon_days: u32) -> Self {
        Self { max_horizon_days }
    }

    /// A horizon must start today or later and end within
    /// `max_horizon_days` of today, the same window `book` accepts.
    pub fn validate(
        &self,
        provider: &Provider,
        horizon: &Horizon,
        now: NaiveDateTime,
    ) -> Result<(), AppointmentError> {
        let today = now.date();
        if horizon.start < today {
            return Err(AppointmentError::InvalidHorizon(format!(
                "start {} is before today ({})",
                horizon.start, today
            )));
        }
        if horizon.days == 0 {
            return Err(AppointmentError::InvalidHorizon("days must be positive".to_string()));
        }
        if horizon.days > self.max_horizon_days {
            return Err(AppointmentError::InvalidHorizon(format!(
                "{} days exceeds the maximum of {}",
                horizon.days, self.max_horizon_days
            )));
        }
        let limit = today
            .checked_add_days(Days::new(u64::from(self.max_horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        match horizon.checked_end() {
            Some(end) if end <= limit => {}
            _ => {
                return Err(AppointmentError::InvalidHorizon(format!(
                    "horizon from {} for {} days ends after {}",
                    horizon.start, horizon.days, limit
                )));
            }
        }
        if horizon.granularity_minutes == 0 {
            return Err(AppointmentError::InvalidHorizon(
                "granularity must be positive".to_string(),
            ));
        }
        if provider.operating_hours.slots_per_day(horizon.granularity_minutes) == 0 {
            return Err(AppointmentError::InvalidHorizon(format!(
                "provider {} has no {}-minute slot in its operating hours",
                provider.id, horizon.granularity_minutes
            )));
        }
        Ok(())
    }

    /// Slots in chronological order, skipping closed days, slots that start
    /// before `now` and any slot held by an active booking for this provider.
    /// Bookings for other providers are ignored.
    pub fn generate(
        &self,
        provider: &Provider,
        horizon: &Horizon,
        held: &[Booking],
        now: NaiveDateTime,
    ) -> Result<SlotCandidates, AppointmentError> {
        self.validate(provider, horizon, now)?;

        let held: HashSet<SlotKey> = held
            .iter()
            .filter(|b| b.status.is_active() && b.provider_id() == provider.id)
            .map(|b| b.slot.key())
            .collect();

        let days: Vec<NaiveDate> = (0..horizon.days)
            .filter_map(|offset| horizon.start.checked_add_days(Days::new(u64::from(offset))))
            .filter(|date| provider.operating_hours.is_open_on(*date))
            .collect();

        debug!(
            "Generating slots for provider {} over {} open days ({} held)",
            provider.id,
            days.len(),
            held.len()
        );

        Ok(SlotCandidates {
            provider_id: provider.id,
            granularity_minutes: horizon.granularity_minutes,
            starts: provider.operating_hours.slot_starts(horizon.granularity_minutes),
            days,
            held,
            not_before: now,
            day: 0,
            start: 0,
        })
    }
}

/// Lazy, restartable slot sequence. Clone it to iterate again.
#[derive(Debug, Clone)]
pub struct SlotCandidates {
    provider_id: uuid::Uuid,
    granularity_minutes: u32,
    starts: Vec<NaiveTime>,
    days: Vec<NaiveDate>,
    held: HashSet<SlotKey>,
    not_before: NaiveDateTime,
    day: usize,
    start: usize,
}

impl Iterator for SlotCandidates {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        while self.day < self.days.len() {
            if self.start >= self.starts.len() {
                self.day += 1;
                self.start = 0;
                continue;
            }

            let slot = Slot {
                provider_id: self.provider_id,
                date: self.days[self.day],
                start_time: self.starts[self.start],
                duration_minutes: self.granularity_minutes,
            };
            self.start += 1;

            if slot.starts_at() >= self.not_before && !self.held.contains(&slot.key()) {
                return Some(slot);
            }
        }
        None
    }
}
