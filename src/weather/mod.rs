pub mod classify;
pub mod client;
pub mod monitor;

use axum::{extract::State, response::Json, routing::post, Form, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::error::AppError;
use crate::state::AppState;
use classify::Assessment;

/// One parsed weather reading for a location, with its alert
/// assessment already applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub location: String,
    pub temperature: Option<f64>,
    pub humidity: Option<i64>,
    pub wind_speed: Option<f64>,
    pub visibility: Option<f64>,
    pub condition: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub assessment: Assessment,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fetch_weather", post(fetch_weather))
        .route("/fetch_extreme_weather", post(fetch_extreme_weather))
        .route("/check_weather_alerts", post(check_weather_alerts))
}

#[derive(Debug, Deserialize)]
struct FetchForm {
    location: String,
}

async fn fetch_weather(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Form(form): Form<FetchForm>,
) -> Result<Json<Value>, AppError> {
    let location = form.location.trim();
    if location.is_empty() {
        return Err(AppError::ValidationError("Location is required".to_string()));
    }

    let Some(observation) = state.weather.fetch(location).await else {
        return Ok(Json(json!({
            "status": "danger",
            "message": format!("Could not fetch weather data for {}", location),
        })));
    };

    let weather_id = monitor::save_observation(&state, &observation, Some(admin.id)).await?;
    let message = if weather_id.is_some() {
        format!("Weather data fetched and stored for {} successfully!", location)
    } else {
        "Weather data fetched but could not save to the store".to_string()
    };

    Ok(Json(json!({
        "status": if weather_id.is_some() { "success" } else { "warning" },
        "message": message,
        "weather": observation,
        "weather_id": weather_id,
    })))
}

/// Sweep every monitored city and publish alerts for whatever came
/// back extreme.
async fn fetch_extreme_weather(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Value>, AppError> {
    let observations = monitor::scan_monitored_cities(&state).await;

    let mut stored = 0usize;
    let mut alerts = 0usize;
    for observation in observations
        .iter()
        .filter(|o| o.assessment.is_extreme)
    {
        if monitor::save_observation(&state, observation, Some(admin.id))
            .await?
            .is_some()
        {
            stored += 1;
            alerts += 1;
        }
    }

    let message = if alerts > 0 {
        format!(
            "Weather scan completed! Found {} extreme weather events requiring alerts. {} weather records saved.",
            alerts, stored
        )
    } else {
        format!(
            "Weather scan completed! No extreme weather detected. {} weather records saved.",
            stored
        )
    };
    Ok(Json(json!({
        "status": if alerts > 0 { "success" } else { "info" },
        "message": message,
        "alerts_created": alerts,
        "stored_count": stored,
    })))
}

async fn check_weather_alerts(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    monitor::refresh_weather_alerts(&state).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Weather alert check completed!",
    })))
}
