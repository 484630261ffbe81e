mod common;

use relief_app::weather::classify::{AlertKind, AlertLevel};
use relief_app::weather::client::WeatherClient;
use wiremock::matchers::{method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetch_parses_and_classifies_a_reading() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex("^/Delhi"))
        .and(query_param("format", "j1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::wttr_payload("46", "12", "Sunny")),
        )
        .mount(&server)
        .await;

    let client = WeatherClient::new(&server.uri()).unwrap();
    let obs = client.fetch("Delhi, India").await.unwrap();

    assert_eq!(obs.location, "Delhi, India");
    assert_eq!(obs.temperature, Some(46.0));
    assert_eq!(obs.latitude, Some(28.6139));
    assert!(obs.assessment.is_extreme);
    assert_eq!(obs.assessment.level, AlertLevel::Orange);
    assert_eq!(obs.assessment.kind, Some(AlertKind::HeatWave));
}

#[tokio::test]
async fn calm_weather_is_not_extreme() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::wttr_payload("24", "8", "Partly cloudy")),
        )
        .mount(&server)
        .await;

    let client = WeatherClient::new(&server.uri()).unwrap();
    let obs = client.fetch("Pune, India").await.unwrap();
    assert!(!obs.assessment.is_extreme);
    assert_eq!(obs.assessment.level, AlertLevel::Green);
}

#[tokio::test]
async fn html_error_pages_yield_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html>overloaded</html>"),
        )
        .mount(&server)
        .await;

    let client = WeatherClient::new(&server.uri()).unwrap();
    assert!(client.fetch("Kolkata, India").await.is_none());
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::wttr_payload("30", "95", "Windy")),
        )
        .mount(&server)
        .await;

    let client = WeatherClient::new(&server.uri()).unwrap();
    let obs = client.fetch("Chennai, India").await.unwrap();
    assert_eq!(obs.assessment.kind, Some(AlertKind::Cyclone));
    assert_eq!(obs.assessment.level, AlertLevel::Orange);
}

#[tokio::test]
async fn hard_failures_give_up_after_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = WeatherClient::new(&server.uri()).unwrap();
    assert!(client.fetch("Patna, India").await.is_none());
}
