//! Monitored-city weather sweeps and alert upkeep.

use futures::StreamExt;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::WeatherObservation;
use crate::announcements;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::models::Announcement;

/// Major metros covering every region of the country.
pub const MONITORED_CITIES: [&str; 12] = [
    "Delhi, India",
    "Mumbai, India",
    "Kolkata, India",
    "Chennai, India",
    "Bangalore, India",
    "Hyderabad, India",
    "Ahmedabad, India",
    "Pune, India",
    "Jaipur, India",
    "Lucknow, India",
    "Patna, India",
    "Bhopal, India",
];

const FAN_OUT: usize = 6;

/// Fetch current weather for the whole roster in parallel. Failures
/// are isolated per city; only successful observations are returned.
pub async fn scan_monitored_cities(state: &AppState) -> Vec<WeatherObservation> {
    let cities: Vec<String> = MONITORED_CITIES.iter().map(|c| c.to_string()).collect();
    let observations: Vec<WeatherObservation> = futures::stream::iter(cities)
        .map(|city| {
            let weather = state.weather.clone();
            async move { weather.fetch(&city).await }
        })
        .buffer_unordered(FAN_OUT)
        .filter_map(|obs| async move { obs })
        .collect()
        .await;

    let extreme = observations
        .iter()
        .filter(|o| o.assessment.is_extreme)
        .count();
    info!(
        "Weather sweep completed: {}/{} cities fetched, {} extreme conditions found",
        observations.len(),
        MONITORED_CITIES.len(),
        extreme
    );
    observations
}

/// Persist an observation and, when extreme, publish or refresh its
/// alert announcement. Returns the stored weather row id.
pub async fn save_observation(
    state: &AppState,
    observation: &WeatherObservation,
    acting_admin: Option<Uuid>,
) -> Result<Option<i64>, AppError> {
    let store = state.store()?;

    let coordinates = match (observation.latitude, observation.longitude) {
        (Some(lat), Some(lon)) => Some(json!({ "lat": lat, "lon": lon })),
        _ => None,
    };
    let alert = observation
        .assessment
        .is_extreme
        .then(|| observation.assessment.message.clone());

    let row = json!({
        "location": observation.location,
        "pincode": extract_pincode(&observation.location),
        "temperature": observation.temperature,
        "humidity": observation.humidity,
        "wind_speed": observation.wind_speed,
        "visibility": observation.visibility,
        "weather_condition": observation.condition,
        "is_extreme": observation.assessment.is_extreme,
        "weather_alert": alert,
        "coordinates": coordinates,
    });

    let inserted: Vec<Value> = match store.table("weather_data").insert(&row).await {
        Ok(rows) => rows,
        Err(err) => {
            // Older deployments miss the visibility/coordinates columns.
            warn!(
                "Weather insert failed ({}), retrying with minimal payload",
                err
            );
            let minimal = json!({
                "location": observation.location,
                "temperature": observation.temperature,
                "humidity": observation.humidity,
                "wind_speed": observation.wind_speed,
                "weather_condition": observation.condition,
                "is_extreme": observation.assessment.is_extreme,
                "weather_alert": observation
                    .assessment
                    .is_extreme
                    .then(|| observation.assessment.message.clone()),
            });
            store.table("weather_data").insert(&minimal).await?
        }
    };

    let weather_id = inserted
        .first()
        .and_then(|r| r.get("id"))
        .and_then(|v| v.as_i64());

    if observation.assessment.is_extreme {
        announcements::upsert_weather_alert(state, observation, weather_id, acting_admin).await?;
    }

    Ok(weather_id)
}

/// Re-check every live weather alert: drop alerts whose weather has
/// normalised and refresh the ones still extreme.
pub async fn refresh_weather_alerts(state: &AppState) -> Result<(), AppError> {
    let store = state.store()?;

    let alerts: Vec<Announcement> = store
        .table("announcements")
        .select("id, title, description, weather_data_id, weather_data(*)")
        .eq("is_weather_alert", "true")
        .fetch()
        .await?;

    if alerts.is_empty() {
        return Ok(());
    }

    futures::stream::iter(alerts)
        .for_each_concurrent(5, |alert| async move {
            if let Err(err) = refresh_single_alert(state, &alert).await {
                warn!("Weather alert upkeep failed for #{}: {}", alert.id, err);
            }
        })
        .await;

    Ok(())
}

async fn refresh_single_alert(state: &AppState, alert: &Announcement) -> Result<(), AppError> {
    let location = alert
        .weather_data
        .as_ref()
        .and_then(|w| w.location.clone())
        .or_else(|| location_from_title(alert.title.as_deref().unwrap_or("")));

    let Some(location) = location else {
        return Ok(());
    };

    let Some(current) = state.weather.fetch(&location).await else {
        return Ok(());
    };

    let store = state.store()?;
    if !current.assessment.is_extreme {
        store
            .table("announcements")
            .eq("id", alert.id)
            .delete()
            .await?;
        info!(
            "Removed weather alert for {} - weather returned to normal",
            location
        );
    } else {
        announcements::upsert_weather_alert(state, &current, alert.weather_data_id, None).await?;
        info!(
            "Updated weather alert for {} - level {}",
            location,
            current.assessment.level.as_str()
        );
    }
    Ok(())
}

/// Recover the location from an alert title when the weather row link
/// is gone. Titles end with "<marker> <location>".
fn location_from_title(title: &str) -> Option<String> {
    for marker in ["Extreme Weather Alert - ", "🌡️", "❄️", "🌪️", "⚡", "🌬️", "🌊"] {
        if let Some(idx) = title.find(marker) {
            let tail = title[idx + marker.len()..].trim();
            // Strip a leading "... - " left over from formatted titles.
            let location = tail.rsplit(" - ").next().unwrap_or(tail).trim();
            if !location.is_empty() {
                return Some(location.to_string());
            }
        }
    }
    None
}

/// Pull a six-digit postal code out of a free-text location, if any.
pub fn extract_pincode(location: &str) -> Option<String> {
    let re = Regex::new(r"\b(\d{6})\b").unwrap();
    re.captures(location)
        .map(|caps| caps.get(1).unwrap().as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pincode_is_extracted_when_present() {
        assert_eq!(
            extract_pincode("Koramangala, Bangalore 560034, India"),
            Some("560034".to_string())
        );
        assert_eq!(extract_pincode("Delhi, India"), None);
        // Seven digits is not a pincode.
        assert_eq!(extract_pincode("ref 1234567"), None);
    }

    #[test]
    fn location_recovered_from_plain_title() {
        assert_eq!(
            location_from_title("Extreme Weather Alert - Chennai, India"),
            Some("Chennai, India".to_string())
        );
    }

    #[test]
    fn location_recovered_from_emoji_title() {
        assert_eq!(
            location_from_title("🟥 🌡️ EXTREME HEAT WAVE - Jaipur, India"),
            Some("Jaipur, India".to_string())
        );
    }
}
