pub mod auth;
pub mod billing;
pub mod error;
pub mod lifecycle;
