//! wttr.in weather client.
//!
//! The upstream reports numbers as strings and occasionally answers
//! with HTML when overloaded, so parsing is deliberately tolerant:
//! anything unusable becomes `None` after a logged warning.

use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use super::classify;
use super::WeatherObservation;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(8))
            .user_agent("relief-app/0.1 (+wttr fetch)")
            .build()?;

        Ok(WeatherClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch and classify the current weather for a location name.
    pub async fn fetch(&self, location: &str) -> Option<WeatherObservation> {
        let mut endpoint = url::Url::parse(&self.base_url).ok()?;
        endpoint.path_segments_mut().ok()?.push(location);
        endpoint.set_query(Some("format=j1"));

        let body = self.get_with_retry(endpoint.as_str(), location).await?;
        parse_observation(location, &body)
    }

    async fn get_with_retry(&self, endpoint: &str, location: &str) -> Option<Value> {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.http.get(endpoint).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let content_type = resp
                            .headers()
                            .get("content-type")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_lowercase();
                        if !content_type.contains("json") {
                            let snippet: String =
                                resp.text().await.unwrap_or_default().chars().take(200).collect();
                            warn!(
                                "Weather API non-JSON response for {}: CT={} body={}",
                                location, content_type, snippet
                            );
                            return None;
                        }
                        match resp.json::<Value>().await {
                            Ok(body) => return Some(body),
                            Err(err) => {
                                warn!("Weather JSON decode failed for {}: {}", location, err);
                                return None;
                            }
                        }
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt == MAX_ATTEMPTS {
                        warn!("Weather fetch for {} failed: HTTP {}", location, status);
                        return None;
                    }
                }
                Err(err) => {
                    if attempt == MAX_ATTEMPTS {
                        warn!("Weather fetch for {} failed: {}", location, err);
                        return None;
                    }
                }
            }
            tokio::time::sleep(BACKOFF * attempt).await;
        }
        None
    }
}

fn parse_observation(location: &str, body: &Value) -> Option<WeatherObservation> {
    let current = body.get("current_condition")?.get(0)?;

    let temperature = number_field(current.get("temp_C"));
    let humidity = number_field(current.get("humidity")).map(|h| h as i64);
    let wind_speed = number_field(current.get("windspeedKmph"));
    let visibility = number_field(current.get("visibility"));
    let condition = current
        .get("weatherDesc")
        .and_then(|d| d.get(0))
        .and_then(|d| d.get("value"))
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();

    let nearest = body.get("nearest_area").and_then(|a| a.get(0));
    let latitude = nearest.and_then(|n| coordinate_field(n.get("latitude")));
    let longitude = nearest.and_then(|n| coordinate_field(n.get("longitude")));

    let assessment = classify::assess(
        temperature,
        wind_speed,
        visibility,
        &condition,
        humidity.map(|h| h as f64),
    );

    Some(WeatherObservation {
        location: location.to_string(),
        temperature,
        humidity,
        wind_speed,
        visibility,
        condition,
        latitude,
        longitude,
        assessment,
    })
}

/// wttr.in numbers arrive as strings; accept either representation.
fn number_field(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.is_empty() => s.parse().ok(),
        _ => None,
    }
}

/// nearest_area coordinates are sometimes a bare string, sometimes a
/// one-element list of strings.
fn coordinate_field(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Array(items) => number_field(items.first()),
        other => number_field(Some(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_typical_payload() {
        let body = json!({
            "current_condition": [{
                "temp_C": "42",
                "humidity": "30",
                "windspeedKmph": "15",
                "visibility": "10",
                "weatherDesc": [{"value": "Sunny"}],
            }],
            "nearest_area": [{"latitude": ["28.61"], "longitude": ["77.20"]}],
        });

        let obs = parse_observation("Delhi, India", &body).unwrap();
        assert_eq!(obs.temperature, Some(42.0));
        assert_eq!(obs.humidity, Some(30));
        assert_eq!(obs.condition, "Sunny");
        assert_eq!(obs.latitude, Some(28.61));
        assert!(obs.assessment.is_extreme);
    }

    #[test]
    fn missing_current_condition_is_none() {
        assert!(parse_observation("Nowhere", &json!({})).is_none());
    }

    #[test]
    fn blank_numbers_become_none() {
        let body = json!({
            "current_condition": [{
                "temp_C": "",
                "weatherDesc": [{"value": "Mist"}],
            }],
        });
        let obs = parse_observation("Shimla", &body).unwrap();
        assert_eq!(obs.temperature, None);
        assert_eq!(obs.condition, "Mist");
        assert!(!obs.assessment.is_extreme);
    }
}
