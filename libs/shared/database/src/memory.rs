use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::store::{Record, StoreError};

/// Versioned in-memory table. Every mutating call holds the write lock for
/// its whole read-check-write, so `insert_unless` and `compare_and_swap` are
/// atomic with respect to each other.
pub struct MemoryTable<R: Record> {
    rows: RwLock<HashMap<Uuid, R>>,
}

impl<R: Record> Default for MemoryTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> MemoryTable<R> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<R> {
        self.rows.read().await.get(&id).cloned()
    }

    /// Rows matching `filter`, in no particular order.
    pub async fn scan<F>(&self, filter: F) -> Vec<R>
    where
        F: Fn(&R) -> bool,
    {
        self.rows
            .read()
            .await
            .values()
            .filter(|row| filter(row))
            .cloned()
            .collect()
    }

    /// Inserts `record` unless its id is taken or any existing row satisfies
    /// `conflicts`. This is the in-memory stand-in for a unique index.
    pub async fn insert_unless<F>(&self, record: R, conflicts: F) -> Result<R, StoreError>
    where
        F: Fn(&R) -> bool,
    {
        let mut rows = self.rows.write().await;

        if rows.contains_key(&record.id()) {
            return Err(StoreError::AlreadyExists(format!("id {}", record.id())));
        }
        if let Some(existing) = rows.values().find(|row| conflicts(row)) {
            debug!("Insert of {} rejected, conflicts with {}", record.id(), existing.id());
            return Err(StoreError::AlreadyExists(format!(
                "conflicts with {}",
                existing.id()
            )));
        }

        rows.insert(record.id(), record.clone());
        Ok(record)
    }

    pub async fn insert(&self, record: R) -> Result<R, StoreError> {
        self.insert_unless(record, |_| false).await
    }

    /// Unconditional upsert.
    pub async fn put(&self, record: R) -> R {
        self.rows.write().await.insert(record.id(), record.clone());
        record
    }

    /// Replaces the row only if its stored version equals `expected`. The
    /// stored copy gets `expected + 1`.
    pub async fn compare_and_swap(
        &self,
        id: Uuid,
        expected: u64,
        mut record: R,
    ) -> Result<R, StoreError> {
        let mut rows = self.rows.write().await;

        let current = rows.get(&id).ok_or(StoreError::NotFound(id))?;
        if current.version() != expected {
            return Err(StoreError::VersionMismatch {
                expected,
                actual: current.version(),
            });
        }

        record.set_version(expected + 1);
        rows.insert(id, record.clone());
        Ok(record)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: Uuid,
        key: &'static str,
        version: u64,
    }

    impl Record for Row {
        fn id(&self) -> Uuid {
            self.id
        }
        fn version(&self) -> u64 {
            self.version
        }
        fn set_version(&mut self, version: u64) {
            self.version = version;
        }
    }

    fn row(key: &'static str) -> Row {
        Row {
            id: Uuid::new_v4(),
            key,
            version: 0,
        }
    }

    #[tokio::test]
    async fn insert_unless_enforces_uniqueness() {
        let table = MemoryTable::new();
        table.insert(row("a")).await.unwrap();

        let dup = table.insert_unless(row("a"), |r| r.key == "a").await;
        assert_matches!(dup, Err(StoreError::AlreadyExists(_)));

        table.insert_unless(row("b"), |r| r.key == "b").await.unwrap();
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn compare_and_swap_bumps_version() {
        let table = MemoryTable::new();
        let original = table.insert(row("a")).await.unwrap();

        let mut changed = original.clone();
        changed.key = "z";
        let stored = table.compare_and_swap(original.id, 0, changed.clone()).await.unwrap();
        assert_eq!(stored.version, 1);

        let stale = table.compare_and_swap(original.id, 0, changed).await;
        assert_matches!(stale, Err(StoreError::VersionMismatch { expected: 0, actual: 1 }));

        let missing = table.compare_and_swap(Uuid::new_v4(), 0, row("q")).await;
        assert_matches!(missing, Err(StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn scan_filters_rows() {
        let table = MemoryTable::new();
        table.put(row("a")).await;
        table.put(row("b")).await;
        table.put(row("a")).await;

        assert_eq!(table.scan(|r| r.key == "a").await.len(), 2);
        assert!(!table.is_empty().await);
    }
}
