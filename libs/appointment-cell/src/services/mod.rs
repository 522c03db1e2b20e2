pub mod conflict;
pub mod lifecycle;
pub mod scheduling;
pub mod slots;
pub mod store;

pub use conflict::{ConflictResolver, ReservationRequest, SlotLocks};
pub use lifecycle::AppointmentLifecycleService;
pub use scheduling::{Clock, SchedulingService};
pub use slots::{SlotCandidates, SlotGenerator};
pub use store::{BookingStore, MemoryBookingStore, SupabaseBookingStore};
