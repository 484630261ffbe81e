//! Public announcements, including auto-managed weather alerts.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AdminUser, CurrentUser, Role};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::models::{Announcement, Incident};
use crate::store::Store;
use crate::weather::monitor;
use crate::weather::WeatherObservation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/announcements", get(list_announcements))
        .route("/create_announcement", post(create_announcement))
        .route("/edit_announcement", post(edit_announcement))
        .route("/delete_announcement/:id", post(delete_announcement))
}

#[derive(Debug, Deserialize)]
struct CreateForm {
    title: String,
    description: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    weather_data_id: Option<i64>,
    #[serde(default)]
    is_weather_alert: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditForm {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

async fn list_announcements(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    // Drop alerts for weather that has since normalised.
    if let Err(err) = monitor::refresh_weather_alerts(&state).await {
        warn!("Weather alert upkeep failed: {}", err);
    }

    let announcements: Vec<Announcement> = state
        .store()?
        .table("announcements")
        .select("*, weather_data(*)")
        .order("timestamp", true)
        .fetch()
        .await?;

    Ok(Json(json!({ "announcements": announcements })))
}

async fn create_announcement(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Form(form): Form<CreateForm>,
) -> Result<Json<Value>, AppError> {
    if form.title.trim().is_empty() || form.description.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Title and description are required".to_string(),
        ));
    }

    let mut payload = json!({
        "admin_id": admin.id,
        "title": form.title,
        "description": form.description,
        "severity": form.severity.unwrap_or_else(|| "medium".to_string()),
        "is_weather_alert": form.is_weather_alert.as_deref() == Some("on"),
    });
    if let Some(weather_id) = form.weather_data_id {
        payload["weather_data_id"] = json!(weather_id);
    }

    state
        .store()?
        .table("announcements")
        .insert::<_, Value>(&payload)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Announcement created successfully!",
    })))
}

async fn edit_announcement(
    State(state): State<AppState>,
    _admin: AdminUser,
    Form(form): Form<EditForm>,
) -> Result<Json<Value>, AppError> {
    let mut patch = serde_json::Map::new();
    if let Some(title) = form.title.filter(|t| !t.trim().is_empty()) {
        patch.insert("title".to_string(), json!(title.trim()));
    }
    if let Some(description) = form.description.filter(|d| !d.trim().is_empty()) {
        patch.insert("description".to_string(), json!(description.trim()));
    }

    if patch.is_empty() {
        return Ok(Json(
            json!({"status": "info", "message": "Nothing to update."}),
        ));
    }

    let updated: Vec<Value> = state
        .store()?
        .table("announcements")
        .eq("id", form.id)
        .update(&Value::Object(patch))
        .await?;

    if updated.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Failed to update announcement.",
        })));
    }
    Ok(Json(json!({
        "status": "success",
        "message": "Announcement updated successfully!",
    })))
}

async fn delete_announcement(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state
        .store()?
        .table("announcements")
        .eq("id", id)
        .delete()
        .await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Announcement deleted successfully!",
    })))
}

pub struct AlertContent {
    pub title: String,
    pub description: String,
    pub severity: &'static str,
}

/// Format the announcement for an extreme observation. Green readings
/// produce nothing.
pub fn alert_content(observation: &WeatherObservation) -> Option<AlertContent> {
    let assessment = &observation.assessment;
    if !assessment.is_extreme {
        return None;
    }

    let level = assessment.level;
    let headline = assessment
        .message
        .split(':')
        .next()
        .filter(|h| !h.is_empty())
        .unwrap_or("Weather Alert");
    let title = format!("{} {} - {}", level.emoji(), headline, observation.location);

    let description = format!(
        "{emoji} **{level} ALERT - {meaning}** {emoji}\n\n\
         📍 **Location:** {location}\n\
         🌡️ **Temperature:** {temp}°C\n\
         💨 **Wind Speed:** {wind} km/h\n\
         👁️ **Visibility:** {vis} km\n\
         🌧️ **Condition:** {condition}\n\n\
         ⚠️ **ALERT DETAILS:**\n{message}\n\n\
         📋 **ACTION REQUIRED:**\n{action}\n\n\
         🕐 **Alert Level:** {level}\n\
         📊 **Alert Type:** {kind}\n\n\
         Stay safe and follow official weather updates!\n\
         - ResQchain Emergency Management System",
        emoji = level.emoji(),
        level = level.as_str().to_uppercase(),
        meaning = level.meaning().to_uppercase(),
        location = observation.location,
        temp = display(observation.temperature),
        wind = display(observation.wind_speed),
        vis = display(observation.visibility),
        condition = observation.condition,
        message = assessment.message,
        action = level.action(),
        kind = assessment.kind.map(|k| k.label()).unwrap_or("General"),
    );

    Some(AlertContent {
        title,
        description,
        severity: level.severity(),
    })
}

fn display(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Publish or refresh the weather alert for an observation's city.
/// Alerts are keyed per city so repeated sweeps update in place.
pub async fn upsert_weather_alert(
    state: &AppState,
    observation: &WeatherObservation,
    weather_id: Option<i64>,
    acting_admin: Option<Uuid>,
) -> Result<Option<i64>, AppError> {
    let Some(content) = alert_content(observation) else {
        return Ok(None);
    };
    let store = state.store()?;

    let city = observation
        .location
        .split(',')
        .next()
        .unwrap_or(&observation.location)
        .trim();

    let existing: Option<Announcement> = store
        .table("announcements")
        .select("id, title, description")
        .eq("is_weather_alert", "true")
        .ilike("title", &format!("*{}*", city))
        .fetch_optional()
        .await?;

    if let Some(existing) = existing {
        let patch = json!({
            "title": content.title,
            "description": content.description,
            "severity": content.severity,
            "weather_data_id": weather_id,
        });
        let updated: Vec<Value> = store
            .table("announcements")
            .eq("id", existing.id)
            .update(&patch)
            .await?;
        if !updated.is_empty() {
            info!(
                "Updated existing weather alert for {} - level {}",
                city,
                observation.assessment.level.as_str()
            );
            return Ok(Some(existing.id));
        }
        return Ok(None);
    }

    let admin_id = match acting_admin {
        Some(id) => Some(id),
        None => any_admin_id(store).await,
    };

    let mut payload = json!({
        "title": content.title,
        "description": content.description,
        "severity": content.severity,
        "is_weather_alert": true,
        "weather_data_id": weather_id,
    });
    if let Some(admin_id) = admin_id {
        payload["admin_id"] = json!(admin_id);
    }

    let inserted: Vec<Value> = store.table("announcements").insert(&payload).await?;
    let id = inserted
        .first()
        .and_then(|r| r.get("id"))
        .and_then(|v| v.as_i64());
    if id.is_some() {
        info!(
            "Created weather alert announcement for {} - level {}",
            city,
            observation.assessment.level.as_str()
        );
    }
    Ok(id)
}

/// Verified-incident announcement published when an admin forwards a
/// report to government.
pub async fn create_disaster_announcement(
    store: &Store,
    admin_id: Uuid,
    incident: &Incident,
) -> Result<(), AppError> {
    let location = incident.location.as_deref().unwrap_or("Unknown Location");
    let severity = incident.severity.as_deref().unwrap_or("medium");

    let mut title = format!("🚨 DISASTER WARNING - {}", location);
    if let Some(pincode) = incident.pincode.as_deref() {
        title.push_str(&format!(" (Pincode: {})", pincode));
    }

    let description = format!(
        "🚨 EMERGENCY ALERT - VERIFIED INCIDENT 🚨\n\n\
         Location: {location}\n\
         Pincode: {pincode}\n\
         Severity: {severity}\n\
         Status: VERIFIED & FORWARDED TO GOVERNMENT\n\n\
         Details: {details}\n\n\
         ⚠️ IMPORTANT SAFETY INSTRUCTIONS:\n\
         • Stay indoors and avoid the affected area\n\
         • Follow instructions from local authorities\n\
         • Keep emergency supplies ready\n\
         • Monitor official updates\n\n\
         This incident has been verified by our admin team and forwarded to \
         government authorities for immediate action.\n\n\
         Stay safe and follow official instructions.\n\
         - ResQchain Emergency Management System",
        location = location,
        pincode = incident.pincode.as_deref().unwrap_or("Not specified"),
        severity = severity.to_uppercase(),
        details = incident
            .description
            .as_deref()
            .unwrap_or("No description available"),
    );

    let payload = json!({
        "admin_id": admin_id,
        "title": title,
        "description": description,
        "severity": severity,
        "is_weather_alert": false,
    });
    store
        .table("announcements")
        .insert::<_, Value>(&payload)
        .await?;
    Ok(())
}

pub async fn any_admin_id(store: &Store) -> Option<Uuid> {
    let row: Option<Value> = store
        .table("users")
        .select("id")
        .eq("role", Role::Admin.as_str())
        .fetch_optional()
        .await
        .ok()
        .flatten();
    row.and_then(|r| {
        r.get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::classify::assess;

    fn observation(temp: f64) -> WeatherObservation {
        WeatherObservation {
            location: "Jaipur, India".to_string(),
            temperature: Some(temp),
            humidity: None,
            wind_speed: Some(10.0),
            visibility: Some(10.0),
            condition: "Sunny".to_string(),
            latitude: None,
            longitude: None,
            assessment: assess(Some(temp), Some(10.0), Some(10.0), "Sunny", None),
        }
    }

    #[test]
    fn no_content_for_normal_weather() {
        assert!(alert_content(&observation(25.0)).is_none());
    }

    #[test]
    fn extreme_heat_produces_critical_alert() {
        let content = alert_content(&observation(48.0)).unwrap();
        assert!(content.title.contains("Jaipur, India"));
        assert!(content.title.contains("🟥"));
        assert_eq!(content.severity, "critical");
        assert!(content.description.contains("EXTREME HEAT WAVE"));
        assert!(content.description.contains("ACTION REQUIRED"));
    }
}
