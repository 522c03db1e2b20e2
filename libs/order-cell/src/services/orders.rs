// libs/order-cell/src/services/orders.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::billing::{BillableKind, BillingNotice};
use shared_models::lifecycle::Lifecycle;

use crate::models::{
    Order, OrderActor, OrderError, OrderEvent, OrderItem, OrderStatus, OrderStatusChange,
    OrderUpdate,
};
use crate::services::lifecycle::authorize_order_event;
use crate::services::store::OrderStore;

pub struct OrderService {
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    fn validate_items(items: &[OrderItem]) -> Result<u64, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut total: u64 = 0;
        for item in items {
            if item.name.trim().is_empty() {
                return Err(OrderError::InvalidItem("item name is empty".to_string()));
            }
            if item.quantity == 0 {
                return Err(OrderError::InvalidItem(format!(
                    "'{}' has zero quantity",
                    item.name
                )));
            }
            total = total.saturating_add(item.line_total_cents());
        }
        Ok(total)
    }

    #[instrument(skip(self, items))]
    pub async fn create_order(
        &self,
        patient_id: Uuid,
        pharmacy_id: Uuid,
        items: Vec<OrderItem>,
    ) -> Result<Order, OrderError> {
        let total_cents = Self::validate_items(&items)?;
        let now = Utc::now();

        let order = self
            .store
            .insert(Order {
                id: Uuid::new_v4(),
                patient_id,
                pharmacy_id,
                items,
                total_cents,
                status: OrderStatus::Pending,
                cancellation_reason: None,
                history: Vec::new(),
                version: 1,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("Created order {} for {} cents", order.id, order.total_cents);
        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid, actor: OrderActor) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        let visible = match actor {
            OrderActor::Admin => true,
            OrderActor::Patient(id) => id == order.patient_id,
            OrderActor::Pharmacy(id) => id == order.pharmacy_id,
        };

        if !visible {
            return Err(OrderError::Unauthorized(format!(
                "order {} belongs to someone else",
                order_id
            )));
        }
        Ok(order)
    }

    pub async fn list_patient_orders(&self, patient_id: Uuid) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_for_patient(patient_id).await?)
    }

    /// Same retry rule as bookings: one re-read after a lost swap, then
    /// `Conflict`.
    #[instrument(skip(self, reason))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        event: OrderEvent,
        actor: OrderActor,
        reason: Option<String>,
    ) -> Result<OrderUpdate, OrderError> {
        let mut retried = false;

        loop {
            let current = self.load(order_id).await?;
            authorize_order_event(&current, event, actor)?;

            let to = current.status.apply(event)?;
            let now = Utc::now();
            let mut updated = current.clone();
            updated.status = to;
            updated.updated_at = now;
            if to == OrderStatus::Cancelled {
                updated.cancellation_reason = reason.clone();
            }
            updated.history.push(OrderStatusChange {
                from: current.status,
                to,
                event,
                actor,
                reason: reason.clone(),
                at: now,
            });

            match self
                .store
                .compare_and_swap(order_id, current.version, updated)
                .await
            {
                Ok(saved) => {
                    debug!("Order {} {} -> {}", order_id, current.status, saved.status);
                    let billing = Self::billing_notice(&saved);
                    return Ok(OrderUpdate {
                        order: saved,
                        billing,
                    });
                }
                Err(StoreError::VersionMismatch { .. }) if !retried => {
                    debug!("Order {} changed concurrently, re-validating", order_id);
                    retried = true;
                }
                Err(StoreError::VersionMismatch { .. }) => {
                    warn!("Order {} lost the status race twice", order_id);
                    return Err(OrderError::Conflict(format!(
                        "order {} was modified concurrently",
                        order_id
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn billing_notice(order: &Order) -> Option<BillingNotice> {
        if order.status != OrderStatus::Confirmed {
            return None;
        }
        info!("Order {} is billable: {} cents", order.id, order.total_cents);

        Some(BillingNotice {
            kind: BillableKind::Order,
            subject_id: order.id,
            payer_id: order.patient_id,
            status: order.status.to_string(),
            amount_cents: order.total_cents,
            emitted_at: Utc::now(),
        })
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.store
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))
    }
}
