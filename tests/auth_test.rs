use relief_app::store::Store;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn sign_up_returns_the_new_user_id() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(header("apikey", "test-key"))
        .and(body_json(json!({
            "email": "asha@example.com",
            "password": "hunter22",
            "data": {"name": "Asha", "phone": "+911234567890", "role": "user"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": user_id,
            "email": "asha@example.com",
        })))
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let id = store
        .auth()
        .sign_up(
            "asha@example.com",
            "hunter22",
            json!({"name": "Asha", "phone": "+911234567890", "role": "user"}),
        )
        .await
        .unwrap();
    assert_eq!(id, user_id);
}

#[tokio::test]
async fn sign_up_unwraps_nested_user_objects() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": user_id},
        })))
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let id = store
        .auth()
        .sign_up("ravi@example.com", "hunter22", json!({}))
        .await
        .unwrap();
    assert_eq!(id, user_id);
}

#[tokio::test]
async fn password_sign_in_yields_token_and_user() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-token",
            "user": {"id": user_id, "email": "asha@example.com"},
        })))
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let signed_in = store
        .auth()
        .sign_in("asha@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(signed_in.access_token, "jwt-token");
    assert_eq!(signed_in.user.id, user_id);
}

#[tokio::test]
async fn bad_credentials_surface_the_upstream_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_description": "Invalid login credentials",
        })))
        .mount(&server)
        .await;

    let store = Store::new(&server.uri(), "test-key").unwrap();
    let err = store
        .auth()
        .sign_in("asha@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid login credentials"));
}
