use relief_app::store::models::Incident;
use relief_app::store::{Store, StoreError};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetch_translates_filters_into_query_operators() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/incidents"))
        .and(query_param("select", "*"))
        .and(query_param("status", "eq.pending"))
        .and(query_param("order", "timestamp.desc"))
        .and(query_param("limit", "10"))
        .and(header("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 7,
                "location": "Riverside Colony",
                "pincode": "560001",
                "status": "pending",
                "severity": "high",
            }
        ])))
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let rows: Vec<Incident> = store
        .table("incidents")
        .select("*")
        .eq("status", "pending")
        .order("timestamp", true)
        .limit(10)
        .fetch()
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 7);
    assert_eq!(rows[0].pincode.as_deref(), Some("560001"));
    assert_eq!(rows[0].severity.as_deref(), Some("high"));
}

#[tokio::test]
async fn fetch_optional_returns_none_on_empty_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/incidents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let row: Option<Incident> = store
        .table("incidents")
        .select("*")
        .eq("id", 99)
        .fetch_optional()
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn insert_asks_for_representation_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/incidents"))
        .and(header("Prefer", "return=representation"))
        .and(body_json(json!({"location": "Sector 9", "pincode": "110011"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([{"id": 42, "location": "Sector 9"}])),
        )
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let inserted: Vec<Value> = store
        .table("incidents")
        .insert(&json!({"location": "Sector 9", "pincode": "110011"}))
        .await
        .unwrap();

    assert_eq!(inserted[0]["id"], 42);
}

#[tokio::test]
async fn update_applies_filters() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/requests"))
        .and(query_param("id", "eq.5"))
        .and(body_json(json!({"status": "notified"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 5}])))
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let updated: Vec<Value> = store
        .table("requests")
        .eq("id", 5)
        .update(&json!({"status": "notified"}))
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
}

#[tokio::test]
async fn count_reads_the_content_range_total() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .and(header("Prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "0-0/37")
                .set_body_json(json!([{"id": 1}])),
        )
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let total = store.table("announcements").select("id").count().await.unwrap();
    assert_eq!(total, 37);
}

#[tokio::test]
async fn upstream_errors_carry_the_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/incidents"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"message":"column incidents.bogus does not exist"}"#),
        )
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let err = store
        .table("incidents")
        .select("bogus")
        .fetch::<Value>()
        .await
        .unwrap_err();

    match err {
        StoreError::Request { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("does not exist"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn delete_targets_only_matching_rows() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("id", "eq.12"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    store
        .table("announcements")
        .eq("id", 12)
        .delete()
        .await
        .unwrap();
}
