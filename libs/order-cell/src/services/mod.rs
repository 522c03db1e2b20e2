pub mod lifecycle;
pub mod orders;
pub mod store;

pub use lifecycle::authorize_order_event;
pub use orders::OrderService;
pub use store::{MemoryOrderStore, OrderStore, SupabaseOrderStore};
