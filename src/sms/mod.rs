//! SMS notification fan-out through a free SMS gateway.
//!
//! Without an API key the gateway runs in mock mode so the rest of the
//! pipeline (recipient selection, logging, retry) stays exercisable in
//! development. Every attempt is logged to the `sms_notifications`
//! table.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::geo;
use crate::store::models::{Incident, User, WeatherRecord};
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct SmsGateway {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

/// A queued SMS send; drained by the background worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsJob {
    pub incident_id: Option<i64>,
    pub user_id: Option<Uuid>,
    pub phone: String,
    pub message: String,
    pub attempt: u32,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "textId", default)]
    text_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SmsGateway {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("relief-app/0.1")
            .build()?;

        if config.is_sms_configured() {
            info!("SMS gateway configured");
        } else {
            info!("SMS gateway running in mock mode (no API key)");
        }

        Ok(SmsGateway {
            http,
            api_url: config.sms_api_url.clone(),
            api_key: config.sms_api_key.clone(),
        })
    }

    pub fn is_live(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Send one SMS, returning the provider message id.
    pub async fn send(&self, phone: &str, message: &str) -> Result<String, String> {
        if !self.is_live() {
            let id = format!("mock_{:08x}", rand::random::<u32>());
            info!("MOCK SMS to {}: {}", phone, truncate(message, 50));
            return Ok(id);
        }

        let resp = self
            .http
            .post(&self.api_url)
            .form(&[
                ("phone", phone),
                ("message", message),
                ("key", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let body: GatewayResponse = resp.json().await.map_err(|e| e.to_string())?;
        if body.success {
            Ok(format!(
                "textbelt_{}",
                body.text_id.unwrap_or_else(|| "unknown".to_string())
            ))
        } else {
            Err(body.error.unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}

/// Users to notify about an incident: same-pincode users first, then
/// users within the radius, then users with no stored coordinates at
/// all (they still want alerts). De-duplicated by id.
pub async fn nearby_users(
    store: &Store,
    pincode: Option<&str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    radius_km: f64,
) -> Result<Vec<User>, StoreError> {
    let candidates: Vec<User> = store
        .table("users")
        .select("id, phone, latitude, longitude, name, email, pincode")
        .not_null("phone")
        .fetch()
        .await?;

    let mut pincode_users = Vec::new();
    let mut radius_users = Vec::new();

    for user in candidates {
        if let (Some(target), Some(theirs)) = (pincode, user.pincode.as_deref()) {
            if target == theirs {
                pincode_users.push(user);
                continue;
            }
        }

        match (user.latitude, user.longitude, latitude, longitude) {
            (Some(ulat), Some(ulon), Some(ilat), Some(ilon)) => {
                if geo::haversine_km(ilat, ilon, ulat, ulon) <= radius_km {
                    radius_users.push(user);
                }
            }
            _ => radius_users.push(user),
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for user in pincode_users.into_iter().chain(radius_users) {
        if seen.insert(user.id) {
            out.push(user);
        }
    }

    info!("Selected {} users for SMS notification", out.len());
    Ok(out)
}

pub fn incident_message(incident: &Incident) -> String {
    let location = incident.location.as_deref().unwrap_or("Unknown location");
    let severity = incident.severity.as_deref().unwrap_or("medium");
    let description = incident
        .description
        .as_deref()
        .unwrap_or("No description available");
    let description = truncate(description, 80);

    let mut location_info = location.to_string();
    if let Some(pincode) = incident.pincode.as_deref() {
        location_info.push_str(&format!(" (Pincode: {})", pincode));
    }

    let severity_emoji = match severity.to_lowercase().as_str() {
        "low" => "⚠️",
        "high" => "🚨🚨",
        "critical" => "🚨🚨🚨",
        _ => "🚨",
    };

    format!(
        "{emoji} DISASTER WARNING {emoji}\n\n\
         VERIFIED INCIDENT in {location}\n\n\
         Severity: {severity}\n\
         Details: {description}\n\n\
         ⚠️ SAFETY INSTRUCTIONS:\n\
         • Stay indoors\n\
         • Avoid the area\n\
         • Follow authorities\n\
         • Keep supplies ready\n\n\
         This incident has been VERIFIED and forwarded to government authorities.\n\n\
         Stay safe!\n\
         - ResQchain Emergency System",
        emoji = severity_emoji,
        location = location_info,
        severity = severity.to_uppercase(),
        description = description,
    )
}

pub fn weather_alert_message(record: &WeatherRecord) -> String {
    format!(
        "🌦️ WEATHER ALERT 🌦️\n\n\
         {alert}\n\n\
         Location: {location}\n\
         Temperature: {temp}°C\n\
         Condition: {condition}\n\n\
         Please take necessary precautions and stay safe.\n\n\
         - ResQchain Weather System",
        alert = record.weather_alert.as_deref().unwrap_or("Weather Alert"),
        location = record.location.as_deref().unwrap_or("Unknown"),
        temp = record
            .temperature
            .map(|t| t.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
        condition = record.weather_condition.as_deref().unwrap_or("Unknown"),
    )
}

/// Record a send attempt; failures here are logged, never fatal.
pub async fn log_notification(
    store: &Store,
    user_id: Option<Uuid>,
    phone: &str,
    message: &str,
    incident_id: Option<i64>,
    status: &str,
    provider_id: Option<&str>,
    error_message: Option<&str>,
) {
    let row = json!({
        "user_id": user_id,
        "phone_number": phone,
        "message": message,
        "incident_id": incident_id,
        "status": status,
        "provider_id": provider_id,
        "error_message": error_message,
    });
    match store
        .table("sms_notifications")
        .insert::<_, serde_json::Value>(&row)
        .await
    {
        Ok(_) => {}
        Err(err) => error!("Failed to log SMS notification: {}", err),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident_with(severity: &str, description: &str) -> Incident {
        Incident {
            id: 1,
            user_id: None,
            location: Some("Sector 12".to_string()),
            address: None,
            city: None,
            state: None,
            cause: None,
            pincode: Some("400001".to_string()),
            description: Some(description.to_string()),
            severity: Some(severity.to_string()),
            status: None,
            timestamp: None,
            forwarded_at: None,
            resolved_at: None,
            report_count: 0,
        }
    }

    #[test]
    fn incident_message_includes_location_and_pincode() {
        let msg = incident_message(&incident_with("high", "building collapse"));
        assert!(msg.contains("Sector 12 (Pincode: 400001)"));
        assert!(msg.contains("Severity: HIGH"));
        assert!(msg.contains("building collapse"));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "x".repeat(200);
        let msg = incident_message(&incident_with("medium", &long));
        assert!(msg.contains("xxx..."));
        assert!(!msg.contains(&long));
    }
}
