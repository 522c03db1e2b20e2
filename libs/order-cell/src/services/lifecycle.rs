// libs/order-cell/src/services/lifecycle.rs
use shared_models::lifecycle::{Lifecycle, Transition};

use crate::models::{Order, OrderActor, OrderError, OrderEvent, OrderStatus};

const ORDER_TRANSITIONS: &[Transition<OrderStatus>] = &[
    Transition::new(OrderStatus::Pending, OrderEvent::Confirm, OrderStatus::Confirmed),
    Transition::new(OrderStatus::Confirmed, OrderEvent::Prepare, OrderStatus::Preparing),
    Transition::new(OrderStatus::Preparing, OrderEvent::MarkReady, OrderStatus::Ready),
    Transition::new(OrderStatus::Ready, OrderEvent::Complete, OrderStatus::Completed),
    Transition::new(OrderStatus::Pending, OrderEvent::Cancel, OrderStatus::Cancelled),
    Transition::new(OrderStatus::Confirmed, OrderEvent::Cancel, OrderStatus::Cancelled),
    Transition::new(OrderStatus::Preparing, OrderEvent::Cancel, OrderStatus::Cancelled),
    Transition::new(OrderStatus::Ready, OrderEvent::Cancel, OrderStatus::Cancelled),
];

impl Lifecycle for OrderStatus {
    type Event = OrderEvent;

    fn transitions() -> &'static [Transition<Self>] {
        ORDER_TRANSITIONS
    }

    fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// The fulfilling pharmacy drives the order forward; the patient who placed
/// it may only cancel.
pub fn authorize_order_event(
    order: &Order,
    event: OrderEvent,
    actor: OrderActor,
) -> Result<(), OrderError> {
    let allowed = match actor {
        OrderActor::Admin => true,
        OrderActor::Pharmacy(id) => id == order.pharmacy_id,
        OrderActor::Patient(id) => id == order.patient_id && event == OrderEvent::Cancel,
    };

    if allowed {
        Ok(())
    } else {
        Err(OrderError::Unauthorized(format!(
            "not permitted to {} order {}",
            event, order.id
        )))
    }
}
