use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
};
use chrono::NaiveTime;
use tower::ServiceExt;
use uuid::Uuid;

use provider_cell::{
    provider_routes, Coordinate, InMemoryProviderDirectory, OperatingHours, Provider,
    ProviderKind, ProviderSearchService,
};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn seeded_service() -> (Arc<ProviderSearchService>, Uuid) {
    let id = Uuid::new_v4();
    let provider = Provider {
        id,
        display_name: "Nile Family Clinic".to_string(),
        kind: ProviderKind::Clinic,
        specialty: None,
        coordinate: Some(Coordinate::new(30.05, 31.23)),
        operating_hours: OperatingHours::new(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        ),
        slot_minutes: 30,
        consultation_fee_cents: None,
        is_available: true,
    };
    let directory = InMemoryProviderDirectory::new(vec![provider]);
    (Arc::new(ProviderSearchService::new(Arc::new(directory))), id)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn search_requires_token() {
    let config = TestConfig::default();
    let (service, _) = seeded_service();
    let app = provider_routes(config.to_arc(), service);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn search_returns_distance() {
    let config = TestConfig::default();
    let (service, id) = seeded_service();
    let app = provider_routes(config.to_arc(), service);
    let bearer = JwtTestUtils::bearer(&TestUser::patient("p@example.com"), &config.jwt_secret);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/?lat=30.0444&lon=31.2357&q=nile")
                .header(AUTHORIZATION, bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["ranked_by_distance"], true);
    assert_eq!(json["providers"][0]["id"], id.to_string());
    assert!(json["providers"][0]["distance_km"].as_f64().unwrap() < 5.0);
}

#[tokio::test]
async fn half_a_coordinate_is_a_bad_request() {
    let config = TestConfig::default();
    let (service, _) = seeded_service();
    let app = provider_routes(config.to_arc(), service);
    let bearer = JwtTestUtils::bearer(&TestUser::patient("p@example.com"), &config.jwt_secret);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/?lat=30.0")
                .header(AUTHORIZATION, bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_provider_is_404() {
    let config = TestConfig::default();
    let (service, _) = seeded_service();
    let app = provider_routes(config.to_arc(), service);
    let bearer = JwtTestUtils::bearer(&TestUser::patient("p@example.com"), &config.jwt_secret);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/{}", Uuid::new_v4()))
                .header(AUTHORIZATION, bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "not_found");
}
