use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use appointment_cell::{
    AppointmentError, Booking, BookingMode, BookingStatus, BookingStore, ConflictResolver,
    ReservationRequest, Slot, SupabaseBookingStore,
};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

fn store_for(server: &MockServer) -> SupabaseBookingStore {
    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        ..AppConfig::default()
    };
    SupabaseBookingStore::new(Arc::new(SupabaseClient::new(&config)))
}

fn slot() -> Slot {
    Slot {
        provider_id: Uuid::new_v4(),
        date: NaiveDate::from_ymd_opt(2030, 2, 4).unwrap(),
        start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        duration_minutes: 30,
    }
}

fn row(slot: &Slot, status: &str) -> serde_json::Value {
    let now = Utc::now();
    json!({
        "id": Uuid::new_v4(),
        "provider_id": slot.provider_id,
        "date": slot.date,
        "start_time": "14:00:00",
        "duration_minutes": slot.duration_minutes,
        "patient_id": Uuid::new_v4(),
        "mode": "online",
        "reason": null,
        "status": status,
        "fee_cents": 12000,
        "cancellation_reason": null,
        "history": [],
        "version": 1,
        "created_at": now,
        "updated_at": now
    })
}

#[tokio::test]
async fn active_for_slot_filters_out_cancelled() {
    let server = MockServer::start().await;
    let slot = slot();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_bookings"))
        .and(query_param("provider_id", format!("eq.{}", slot.provider_id)))
        .and(query_param("date", "eq.2030-02-04"))
        .and(query_param("start_time", "eq.14:00:00"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(&slot, "confirmed")])))
        .mount(&server)
        .await;

    let booking: Booking = store_for(&server)
        .active_for_slot(&slot.key())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.slot, slot);
    assert_eq!(booking.mode, BookingMode::Online);
}

#[tokio::test]
async fn unique_index_violation_is_slot_unavailable() {
    let server = MockServer::start().await;
    let slot = slot();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_bookings"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointment_bookings_active_slot\""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = ConflictResolver::new(Arc::new(store_for(&server)));
    let result = resolver
        .reserve(ReservationRequest {
            slot: slot.clone(),
            patient_id: Uuid::new_v4(),
            mode: BookingMode::InPerson,
            reason: None,
            fee_cents: None,
        })
        .await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable(key)) if key == slot.key());
}

#[tokio::test]
async fn provider_listing_uses_date_range() {
    let server = MockServer::start().await;
    let slot = slot();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_bookings"))
        .and(query_param("provider_id", format!("eq.{}", slot.provider_id)))
        .and(query_param("order", "date.asc,start_time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            row(&slot, "pending"),
            row(&slot, "cancelled")
        ])))
        .mount(&server)
        .await;

    let from = NaiveDate::from_ymd_opt(2030, 2, 1).unwrap();
    let to = NaiveDate::from_ymd_opt(2030, 3, 1).unwrap();
    let bookings = store_for(&server)
        .list_for_provider(slot.provider_id, Some((from, to)))
        .await
        .unwrap();

    assert_eq!(bookings.len(), 2);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("date=gte.2030-02-01"));
    assert!(query.contains("date=lt.2030-03-01"));
}

#[tokio::test]
async fn backend_failure_is_a_storage_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_bookings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let resolver = ConflictResolver::new(Arc::new(store_for(&server)));
    assert_matches!(
        resolver.is_held(&slot().key()).await,
        Err(AppointmentError::Storage(_))
    );
}
