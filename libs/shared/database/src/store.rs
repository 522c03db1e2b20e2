use thiserror::Error;
use uuid::Uuid;

use crate::supabase::DatabaseError;

/// A row that carries its own optimistic-concurrency version.
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(Uuid),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("version mismatch: expected {expected}, found {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(msg) => StoreError::AlreadyExists(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
