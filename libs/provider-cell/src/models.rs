use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::geo::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Doctor,
    Pharmacy,
    Clinic,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Doctor => write!(f, "doctor"),
            ProviderKind::Pharmacy => write!(f, "pharmacy"),
            ProviderKind::Clinic => write!(f, "clinic"),
        }
    }
}

/// Daily opening window. A slot starting at `t` fits when
/// `open <= t` and `t + length <= close`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    #[serde(default)]
    pub closed_days: Vec<Weekday>,
}

impl OperatingHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            open,
            close,
            closed_days: Vec::new(),
        }
    }

    pub fn with_closed_days(mut self, days: Vec<Weekday>) -> Self {
        self.closed_days = days;
        self
    }

    pub fn window_minutes(&self) -> i64 {
        (self.close - self.open).num_minutes().max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.window_minutes() == 0
    }

    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        !self.closed_days.contains(&date.weekday())
    }

    /// Number of whole slots of `granularity_minutes` that fit in one day.
    pub fn slots_per_day(&self, granularity_minutes: u32) -> usize {
        if granularity_minutes == 0 {
            return 0;
        }
        (self.window_minutes() / i64::from(granularity_minutes)) as usize
    }

    /// Start times of every slot in one day, earliest first.
    pub fn slot_starts(&self, granularity_minutes: u32) -> Vec<NaiveTime> {
        let step = Duration::minutes(i64::from(granularity_minutes));
        (0..self.slots_per_day(granularity_minutes))
            .map(|i| self.open + step * i as i32)
            .collect()
    }

    /// True when `time` is one of the slot starts for this granularity.
    pub fn is_slot_start(&self, time: NaiveTime, granularity_minutes: u32) -> bool {
        if granularity_minutes == 0 || time < self.open || time.nanosecond() != 0 {
            return false;
        }
        let offset = (time - self.open).num_minutes();
        let fits = offset + i64::from(granularity_minutes) <= self.window_minutes();
        let aligned = (time - self.open).num_seconds() % (i64::from(granularity_minutes) * 60) == 0;
        fits && aligned
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub display_name: String,
    pub kind: ProviderKind,
    pub specialty: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub operating_hours: OperatingHours,
    pub slot_minutes: u32,
    pub consultation_fee_cents: Option<u64>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

impl Provider {
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.display_name.to_lowercase().contains(&needle)
            || self
                .specialty
                .as_deref()
                .map(|s| s.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderFilter {
    pub text: Option<String>,
    pub kind: Option<ProviderKind>,
    #[serde(default)]
    pub available_only: bool,
    pub max_distance_km: Option<f64>,
}

impl ProviderFilter {
    /// Attribute checks only; distance limits are applied by the ranker.
    pub fn admits(&self, provider: &Provider) -> bool {
        if self.available_only && !provider.is_available {
            return false;
        }
        if let Some(kind) = self.kind {
            if provider.kind != kind {
                return false;
            }
        }
        match self.text.as_deref() {
            Some(text) => provider.matches_text(text),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {0} not found")]
    NotFound(Uuid),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Provider directory error: {0}")]
    Directory(String),
}
