//! Guarded, table-driven status machines.
//!
//! Appointment bookings and checkout orders both move through a mostly
//! linear set of statuses with an escape hatch into `cancelled`. Each
//! implements [`Lifecycle`] by listing its legal `(from, event, to)` edges;
//! validation lives here once.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One legal edge of a status graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S: Lifecycle> {
    pub from: S,
    pub event: S::Event,
    pub to: S,
}

impl<S: Lifecycle> Transition<S> {
    pub const fn new(from: S, event: S::Event, to: S) -> Self {
        Self { from, event, to }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionError {
    #[error("cannot apply '{event}' while in state '{from}'")]
    InvalidTransition { from: String, event: String },

    #[error("state '{state}' is terminal, no further transitions allowed")]
    TerminalStateViolation { state: String },
}

pub trait Lifecycle: Copy + Eq + fmt::Debug + fmt::Display + Sized + 'static {
    type Event: Copy + Eq + fmt::Debug + fmt::Display + 'static;

    fn transitions() -> &'static [Transition<Self>];

    fn is_terminal(&self) -> bool;

    /// Resolves `event` against the table. Never mutates; callers persist
    /// the returned state themselves.
    fn apply(self, event: Self::Event) -> Result<Self, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::TerminalStateViolation {
                state: self.to_string(),
            });
        }

        Self::transitions()
            .iter()
            .find(|t| t.from == self && t.event == event)
            .map(|t| t.to)
            .ok_or_else(|| TransitionError::InvalidTransition {
                from: self.to_string(),
                event: event.to_string(),
            })
    }

    fn can_apply(self, event: Self::Event) -> bool {
        self.apply(event).is_ok()
    }

    fn permitted_events(self) -> Vec<Self::Event> {
        if self.is_terminal() {
            return Vec::new();
        }
        Self::transitions()
            .iter()
            .filter(|t| t.from == self)
            .map(|t| t.event)
            .collect()
    }
}
