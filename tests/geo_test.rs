mod common;

use relief_app::geo;
use relief_app::payments;
use relief_app::state::AppState;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn geocode_resolves_a_location() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Connaught Place, Delhi"))
        .and(query_param("format", "json"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"lat": "28.6315", "lon": "77.2167", "display_name": "Connaught Place"}
        ])))
        .mount(&server)
        .await;

    let (state, _rx) = AppState::new(common::test_config(&server.uri())).unwrap();
    let coords = geo::geocode(&state, "Connaught Place, Delhi")
        .await
        .unwrap();
    assert_eq!(coords, Some((28.6315, 77.2167)));
}

#[tokio::test]
async fn geocode_returns_none_for_unknown_places() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (state, _rx) = AppState::new(common::test_config(&server.uri())).unwrap();
    let coords = geo::geocode(&state, "nowhere in particular").await.unwrap();
    assert_eq!(coords, None);
}

#[tokio::test]
async fn qr_images_come_back_base64_encoded() {
    let server = MockServer::start().await;

    let png_bytes: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    Mock::given(method("GET"))
        .and(path("/qr"))
        .and(query_param("size", "300x300"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes),
        )
        .mount(&server)
        .await;

    let (state, _rx) = AppState::new(common::test_config(&server.uri())).unwrap();
    let encoded = payments::qr_png_base64(&state, "upi://pay?pa=relief@bank&am=100")
        .await
        .unwrap();
    assert_eq!(encoded, "iVBORw0KGgo=");
}
