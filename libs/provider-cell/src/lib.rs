pub mod geo;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use geo::{haversine_km, Coordinate, EARTH_RADIUS_KM};
pub use models::*;
pub use services::*;
pub use router::provider_routes;
