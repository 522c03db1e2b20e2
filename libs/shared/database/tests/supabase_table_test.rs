use std::sync::Arc;

use assert_matches::assert_matches;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use shared_config::AppConfig;
use shared_database::{Record, StoreError, SupabaseClient, SupabaseTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Row {
    id: Uuid,
    label: String,
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

fn table_for(server: &MockServer) -> SupabaseTable<Row> {
    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        ..AppConfig::default()
    };
    SupabaseTable::new(Arc::new(SupabaseClient::new(&config)), "rows")
}

#[tokio::test]
async fn get_returns_first_row() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/rows"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(header("apikey", "test-anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": id, "label": "a", "version": 3 }
        ])))
        .mount(&server)
        .await;

    let row = table_for(&server).get(id).await.unwrap().unwrap();
    assert_eq!(row.label, "a");
    assert_eq!(row.version, 3);
}

#[tokio::test]
async fn insert_conflict_maps_to_already_exists() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rows"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let result = table_for(&server)
        .insert(Row {
            id: Uuid::new_v4(),
            label: "dup".to_string(),
            version: 0,
        })
        .await;

    assert_matches!(result, Err(StoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn compare_and_swap_reports_version_mismatch() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/rows"))
        .and(query_param("version", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/rows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": id, "label": "newer", "version": 2 }
        ])))
        .mount(&server)
        .await;

    let result = table_for(&server)
        .compare_and_swap(
            id,
            1,
            Row {
                id,
                label: "mine".to_string(),
                version: 1,
            },
        )
        .await;

    assert_matches!(result, Err(StoreError::VersionMismatch { expected: 1, actual: 2 }));
}

#[tokio::test]
async fn compare_and_swap_returns_updated_row() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/rows"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("version", "eq.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": id, "label": "mine", "version": 1 }
        ])))
        .mount(&server)
        .await;

    let updated = table_for(&server)
        .compare_and_swap(
            id,
            0,
            Row {
                id,
                label: "mine".to_string(),
                version: 0,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.version, 1);
}
