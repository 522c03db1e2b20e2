pub mod directory;
pub mod ranker;
pub mod search;

pub use directory::{InMemoryProviderDirectory, ProviderDirectory, SupabaseProviderDirectory};
pub use ranker::{Located, ProximityRanker, Ranked};
pub use search::ProviderSearchService;
