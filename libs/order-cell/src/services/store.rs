// libs/order-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use shared_database::{MemoryTable, StoreError, SupabaseClient, SupabaseTable};

use crate::models::Order;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Newest first.
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Order>, StoreError>;

    async fn insert(&self, order: Order) -> Result<Order, StoreError>;

    async fn put(&self, order: Order) -> Result<Order, StoreError>;

    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: u64,
        order: Order,
    ) -> Result<Order, StoreError>;
}

#[derive(Default)]
pub struct MemoryOrderStore {
    table: MemoryTable<Order>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.table.get(id).await)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let mut orders = self.table.scan(|o| o.patient_id == patient_id).await;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn insert(&self, order: Order) -> Result<Order, StoreError> {
        self.table.insert(order).await
    }

    async fn put(&self, order: Order) -> Result<Order, StoreError> {
        Ok(self.table.put(order).await)
    }

    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: u64,
        order: Order,
    ) -> Result<Order, StoreError> {
        self.table.compare_and_swap(id, expected_version, order).await
    }
}

pub struct SupabaseOrderStore {
    table: SupabaseTable<Order>,
}

impl SupabaseOrderStore {
    pub const TABLE: &'static str = "orders";

    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            table: SupabaseTable::new(supabase, Self::TABLE),
        }
    }
}

#[async_trait]
impl OrderStore for SupabaseOrderStore {
    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        self.table.get(id).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Order>, StoreError> {
        self.table
            .select(&[
                ("patient_id", format!("eq.{}", patient_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .await
    }

    async fn insert(&self, order: Order) -> Result<Order, StoreError> {
        self.table.insert(order).await
    }

    async fn put(&self, order: Order) -> Result<Order, StoreError> {
        self.table.put(order).await
    }

    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: u64,
        order: Order,
    ) -> Result<Order, StoreError> {
        self.table.compare_and_swap(id, expected_version, order).await
    }
}
