//! Geocoding and shelter lookup against OpenStreetMap services.

use axum::{extract::State, response::Json, routing::post, Form, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;
use crate::store::models::Shelter;

const SEARCH_RADIUS_M: u32 = 10_000;

pub fn router() -> Router<AppState> {
    Router::new().route("/nearby_shelters", post(nearby_shelters))
}

#[derive(Debug, Deserialize)]
struct ShelterForm {
    location: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShelterInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    pub distance_km: Option<f64>,
    pub lat: f64,
    pub lon: f64,
    pub capacity: String,
    pub phone: String,
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Resolve a free-text location to coordinates via Nominatim.
pub async fn geocode(state: &AppState, location: &str) -> Result<Option<(f64, f64)>, AppError> {
    let endpoint = format!("{}/search", state.config.geocoder_base_url);
    let rows: Vec<Value> = state
        .http
        .get(endpoint)
        .query(&[("q", location), ("format", "json"), ("limit", "1")])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let Some(first) = rows.first() else {
        return Ok(None);
    };
    let lat = first
        .get("lat")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok());
    let lon = first
        .get("lon")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok());
    Ok(lat.zip(lon))
}

fn overpass_query(lat: f64, lon: f64) -> String {
    let selectors = [
        ("amenity", "shelter"),
        ("building", "school"),
        ("building", "college"),
        ("amenity", "community_centre"),
        ("amenity", "place_of_worship"),
        ("building", "church"),
        ("building", "temple"),
        ("building", "mosque"),
        ("amenity", "auditorium"),
        ("tourism", "museum"),
        ("leisure", "park"),
        ("leisure", "sports_centre"),
        ("amenity", "theatre"),
        ("amenity", "conference_centre"),
    ];

    let mut body = String::from("[out:json][timeout:25];\n(\n");
    for (key, value) in selectors {
        body.push_str(&format!(
            "  node[\"{key}\"=\"{value}\"](around:{radius},{lat},{lon});\n",
            key = key,
            value = value,
            radius = SEARCH_RADIUS_M,
            lat = lat,
            lon = lon,
        ));
    }
    body.push_str(");\nout body;\n");
    body
}

fn classify_shelter(tags: &Value) -> String {
    let tag = |key: &str| tags.get(key).and_then(|v| v.as_str());

    if tag("amenity") == Some("shelter") {
        "Emergency Shelter"
    } else if tag("building") == Some("school") {
        "School"
    } else if tag("building") == Some("college") {
        "College"
    } else if tag("amenity") == Some("place_of_worship") {
        "Place of Worship"
    } else if matches!(tag("building"), Some("church")) {
        "Church"
    } else if matches!(tag("building"), Some("temple")) {
        "Temple"
    } else if matches!(tag("building"), Some("mosque")) {
        "Mosque"
    } else if tag("amenity") == Some("community_centre") {
        "Community Center"
    } else if tag("amenity") == Some("auditorium") {
        "Auditorium"
    } else if tag("tourism") == Some("museum") {
        "Museum"
    } else if tag("leisure") == Some("park") {
        "Park"
    } else if tag("leisure") == Some("sports_centre") {
        "Sports Center"
    } else if tag("amenity") == Some("theatre") {
        "Theater"
    } else if tag("amenity") == Some("conference_centre") {
        "Conference Center"
    } else {
        "Public Facility"
    }
    .to_string()
}

/// Rough headcount guidance per facility type; surveys are out of
/// reach during an emergency.
fn estimate_capacity(kind: &str) -> String {
    match kind {
        "School" | "College" => "Large (500+ people)",
        "Church" | "Temple" | "Mosque" => "Medium (100-500 people)",
        "Park" => "Very Large (1000+ people)",
        "Museum" => "Medium (200-500 people)",
        "Auditorium" | "Theater" => "Large (300-800 people)",
        "Conference Center" => "Large (200-1000 people)",
        "Sports Center" => "Very Large (500+ people)",
        _ => "Contact for details",
    }
    .to_string()
}

async fn fetch_osm_shelters(
    state: &AppState,
    lat: f64,
    lon: f64,
) -> Result<Vec<ShelterInfo>, AppError> {
    let body: Value = state
        .http
        .post(&state.config.overpass_base_url)
        .form(&[("data", overpass_query(lat, lon))])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let mut shelters = Vec::new();
    let elements = body
        .get("elements")
        .and_then(|e| e.as_array())
        .cloned()
        .unwrap_or_default();

    for element in elements {
        let Some(tags) = element.get("tags") else {
            continue;
        };
        let name = tags.get("name").and_then(|v| v.as_str()).unwrap_or("");
        if name.is_empty() || name == "Unnamed" || name == "Unknown" {
            continue;
        }
        let (Some(slat), Some(slon)) = (
            element.get("lat").and_then(Value::as_f64),
            element.get("lon").and_then(Value::as_f64),
        ) else {
            continue;
        };

        let kind = classify_shelter(tags);
        let distance = haversine_km(lat, lon, slat, slon);
        let phone = tags
            .get("phone")
            .or_else(|| tags.get("contact:phone"))
            .and_then(|v| v.as_str())
            .unwrap_or("Contact not available")
            .to_string();

        shelters.push(ShelterInfo {
            name: name.to_string(),
            capacity: estimate_capacity(&kind),
            kind,
            address: format!("Lat: {:.4}, Lon: {:.4}", slat, slon),
            distance_km: Some((distance * 10.0).round() / 10.0),
            lat: slat,
            lon: slon,
            phone,
        });
    }

    Ok(shelters)
}

/// Best-effort merge of curated shelters from the hosted store.
async fn stored_shelters(state: &AppState) -> Vec<ShelterInfo> {
    let Ok(store) = state.store() else {
        return Vec::new();
    };
    let rows: Vec<Shelter> = match store.table("shelters").select("*").fetch().await {
        Ok(rows) => rows,
        Err(err) => {
            warn!("Stored shelter lookup failed: {}", err);
            return Vec::new();
        }
    };

    rows.into_iter()
        .map(|row| ShelterInfo {
            name: row.name.unwrap_or_default(),
            kind: "Registered Shelter".to_string(),
            address: row.location.unwrap_or_default(),
            capacity: format!(
                "{}/{}",
                row.available.unwrap_or(0),
                row.capacity.unwrap_or(0)
            ),
            distance_km: None,
            lat: 0.0,
            lon: 0.0,
            phone: "Contact not available".to_string(),
        })
        .collect()
}

async fn nearby_shelters(
    State(state): State<AppState>,
    Form(form): Form<ShelterForm>,
) -> Result<Json<Value>, AppError> {
    let location = form.location.trim();
    if location.is_empty() {
        return Err(AppError::ValidationError(
            "Please enter a location".to_string(),
        ));
    }

    let Some((lat, lon)) = geocode(&state, location).await? else {
        return Ok(Json(json!({
            "status": "warning",
            "message": "Could not find the location. Please try a different address.",
            "shelters": [],
        })));
    };

    let mut shelters = match fetch_osm_shelters(&state, lat, lon).await {
        Ok(shelters) => shelters,
        Err(err) => {
            // Fall back to whatever the store has on file.
            warn!("Shelter search failed for {}: {}", location, err);
            Vec::new()
        }
    };
    shelters.extend(stored_shelters(&state).await);

    shelters.sort_by(|a, b| {
        let da = a.distance_km.unwrap_or(f64::INFINITY);
        let db = b.distance_km.unwrap_or(f64::INFINITY);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });

    if shelters.is_empty() {
        return Ok(Json(json!({
            "status": "info",
            "message": "No shelters found nearby. Try expanding your search area.",
            "shelters": [],
            "location": location,
        })));
    }

    Ok(Json(json!({
        "status": "success",
        "shelters": shelters,
        "location": location,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn haversine_known_distance() {
        // Delhi to Mumbai is roughly 1150 km.
        let d = haversine_km(28.6139, 77.2090, 19.0760, 72.8777);
        assert!((1100.0..1200.0).contains(&d), "got {}", d);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert!(haversine_km(10.0, 20.0, 10.0, 20.0) < 1e-9);
    }

    #[test]
    fn classification_prefers_specific_tags() {
        assert_eq!(
            classify_shelter(&json!({"amenity": "shelter"})),
            "Emergency Shelter"
        );
        assert_eq!(classify_shelter(&json!({"building": "school"})), "School");
        assert_eq!(
            classify_shelter(&json!({"leisure": "park"})),
            "Park"
        );
        assert_eq!(classify_shelter(&json!({})), "Public Facility");
    }

    #[test]
    fn capacity_estimates_by_type() {
        assert_eq!(estimate_capacity("School"), "Large (500+ people)");
        assert_eq!(estimate_capacity("Park"), "Very Large (1000+ people)");
        assert_eq!(estimate_capacity("Emergency Shelter"), "Contact for details");
    }

    #[test]
    fn overpass_query_covers_all_selectors() {
        let q = overpass_query(12.97, 77.59);
        assert!(q.contains("[out:json]"));
        assert!(q.contains("\"amenity\"=\"shelter\""));
        assert!(q.contains("\"leisure\"=\"sports_centre\""));
        assert!(q.contains("around:10000,12.97,77.59"));
    }
}
