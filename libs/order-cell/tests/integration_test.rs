use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use tokio_test::assert_ok;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use order_cell::{
    MemoryOrderStore, OrderActor, OrderError, OrderEvent, OrderItem, OrderService, OrderStatus,
    OrderStore, SupabaseOrderStore,
};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::billing::BillableKind;

fn items() -> Vec<OrderItem> {
    vec![
        OrderItem {
            name: "Amoxicillin 500mg".to_string(),
            quantity: 2,
            unit_price_cents: 4_500,
        },
        OrderItem {
            name: "Paracetamol".to_string(),
            quantity: 1,
            unit_price_cents: 1_200,
        },
    ]
}

fn service() -> OrderService {
    OrderService::new(Arc::new(MemoryOrderStore::new()))
}

#[tokio::test]
async fn order_walks_the_full_lifecycle() {
    let service = service();
    let patient = Uuid::new_v4();
    let pharmacy = Uuid::new_v4();

    let order = service.create_order(patient, pharmacy, items()).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_cents, 10_200);

    let confirmed = service
        .update_status(order.id, OrderEvent::Confirm, OrderActor::Pharmacy(pharmacy), None)
        .await
        .unwrap();
    let billing = confirmed.billing.expect("confirmed orders are billable");
    assert_eq!(billing.kind, BillableKind::Order);
    assert_eq!(billing.amount_cents, 10_200);
    assert_eq!(billing.payer_id, patient);

    for event in [OrderEvent::Prepare, OrderEvent::MarkReady, OrderEvent::Complete] {
        let update = service
            .update_status(order.id, event, OrderActor::Pharmacy(pharmacy), None)
            .await
            .unwrap();
        assert!(update.billing.is_none());
    }

    let done = service.get_order(order.id, OrderActor::Patient(patient)).await.unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.history.len(), 4);
    assert_eq!(done.version, 5);

    assert_matches!(
        service
            .update_status(order.id, OrderEvent::Cancel, OrderActor::Admin, None)
            .await,
        Err(OrderError::TerminalStateViolation { .. })
    );
}

#[tokio::test]
async fn patient_can_only_cancel() {
    let service = service();
    let patient = Uuid::new_v4();
    let order = service
        .create_order(patient, Uuid::new_v4(), items())
        .await
        .unwrap();

    assert_matches!(
        service
            .update_status(order.id, OrderEvent::Confirm, OrderActor::Patient(patient), None)
            .await,
        Err(OrderError::Unauthorized(_))
    );

    let update = service
        .update_status(
            order.id,
            OrderEvent::Cancel,
            OrderActor::Patient(patient),
            Some("ordered twice".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(update.order.status, OrderStatus::Cancelled);
    assert_eq!(update.order.cancellation_reason.as_deref(), Some("ordered twice"));
}

#[tokio::test]
async fn skipping_a_step_is_rejected_without_mutation() {
    let service = service();
    let pharmacy = Uuid::new_v4();
    let order = service
        .create_order(Uuid::new_v4(), pharmacy, items())
        .await
        .unwrap();

    assert_matches!(
        service
            .update_status(order.id, OrderEvent::MarkReady, OrderActor::Pharmacy(pharmacy), None)
            .await,
        Err(OrderError::InvalidTransition { .. })
    );

    let unchanged = service.get_order(order.id, OrderActor::Admin).await.unwrap();
    assert_eq!(unchanged, order);
}

#[tokio::test]
async fn invalid_baskets_are_rejected() {
    let service = service();

    assert_eq!(
        service
            .create_order(Uuid::new_v4(), Uuid::new_v4(), Vec::new())
            .await
            .unwrap_err(),
        OrderError::EmptyOrder
    );

    let zero = vec![OrderItem {
        name: "Vitamin D".to_string(),
        quantity: 0,
        unit_price_cents: 900,
    }];
    assert_matches!(
        service.create_order(Uuid::new_v4(), Uuid::new_v4(), zero).await,
        Err(OrderError::InvalidItem(_))
    );
}

#[tokio::test]
async fn orders_are_private() {
    let service = service();
    let order = assert_ok!(
        service
            .create_order(Uuid::new_v4(), Uuid::new_v4(), items())
            .await
    );

    assert_matches!(
        service.get_order(order.id, OrderActor::Pharmacy(Uuid::new_v4())).await,
        Err(OrderError::Unauthorized(_))
    );
    assert_eq!(
        service.get_order(Uuid::nil(), OrderActor::Admin).await.unwrap_err(),
        OrderError::NotFound(Uuid::nil())
    );
}

#[tokio::test]
async fn supabase_store_lists_patient_orders() {
    let server = MockServer::start().await;
    let patient = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/orders"))
        .and(query_param("patient_id", format!("eq.{}", patient)))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": patient,
            "pharmacy_id": Uuid::new_v4(),
            "items": [{ "name": "Insulin pen", "quantity": 1, "unit_price_cents": 32000 }],
            "total_cents": 32000,
            "status": "preparing",
            "cancellation_reason": null,
            "version": 3,
            "created_at": "2030-01-07T10:00:00Z",
            "updated_at": "2030-01-07T11:00:00Z"
        }])))
        .mount(&server)
        .await;

    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        ..AppConfig::default()
    };
    let store = SupabaseOrderStore::new(Arc::new(SupabaseClient::new(&config)));

    let orders = store.list_for_patient(patient).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Preparing);
    assert!(orders[0].history.is_empty());
}
