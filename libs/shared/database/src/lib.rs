pub mod memory;
pub mod store;
pub mod supabase;

pub use memory::MemoryTable;
pub use store::{Record, StoreError};
pub use supabase::{DatabaseError, SupabaseClient, SupabaseTable};
