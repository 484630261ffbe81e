mod common;

use relief_app::sms::SmsGateway;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn gateway_sends_through_the_api_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/text"))
        .and(body_string_contains("phone=%2B919876543210"))
        .and(body_string_contains("key=live-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "textId": "12345",
        })))
        .mount(&server)
        .await;

    let mut config = common::test_config(&server.uri());
    config.sms_api_key = "live-key".to_string();

    let gateway = SmsGateway::new(&config).unwrap();
    assert!(gateway.is_live());

    let provider_id = gateway
        .send("+919876543210", "Stay safe")
        .await
        .unwrap();
    assert_eq!(provider_id, "textbelt_12345");
}

#[tokio::test]
async fn gateway_surfaces_api_rejections() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error": "Out of quota",
        })))
        .mount(&server)
        .await;

    let mut config = common::test_config(&server.uri());
    config.sms_api_key = "live-key".to_string();

    let gateway = SmsGateway::new(&config).unwrap();
    let err = gateway.send("+919876543210", "Stay safe").await.unwrap_err();
    assert_eq!(err, "Out of quota");
}

#[tokio::test]
async fn unconfigured_gateway_mocks_the_send() {
    // No API key: nothing should reach the network.
    let config = common::test_config("http://127.0.0.1:9");
    let gateway = SmsGateway::new(&config).unwrap();
    assert!(!gateway.is_live());

    let provider_id = gateway.send("+911234567890", "test").await.unwrap();
    assert!(provider_id.starts_with("mock_"));
}
