use relief_app::config::AppConfig;
use serde_json::{json, Value};

/// Config pointing every integration at a local mock server.
pub fn test_config(base_url: &str) -> AppConfig {
    AppConfig {
        store_url: base_url.to_string(),
        store_api_key: "test-key".to_string(),
        sms_api_url: format!("{}/text", base_url),
        sms_api_key: String::new(),
        upi_id: "relief@bank".to_string(),
        upi_payee_name: "Relief Fund".to_string(),
        weather_base_url: base_url.to_string(),
        geocoder_base_url: base_url.to_string(),
        overpass_base_url: format!("{}/interpreter", base_url),
        qr_base_url: format!("{}/qr", base_url),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        weather_poll_secs: 300,
    }
}

/// A wttr.in `format=j1` payload with the given current conditions.
pub fn wttr_payload(temp_c: &str, wind_kmph: &str, condition: &str) -> Value {
    json!({
        "current_condition": [{
            "temp_C": temp_c,
            "humidity": "",
            "windspeedKmph": wind_kmph,
            "visibility": "10",
            "weatherDesc": [{"value": condition}],
        }],
        "nearest_area": [{
            "latitude": ["28.6139"],
            "longitude": ["77.2090"],
        }],
    })
}
