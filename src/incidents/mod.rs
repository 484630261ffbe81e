//! Incident reporting and the admin verification flow.

pub mod consolidate;

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::announcements;
use crate::auth::{AdminUser, CurrentUser};
use crate::error::AppError;
use crate::sms::{self, SmsJob};
use crate::state::AppState;
use crate::store::models::{Donation, Incident};

const SMS_RADIUS_KM: f64 = 5.0;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/report_incident", post(report_incident))
        .route("/forward_incident", post(forward_incident))
        .route("/delete_incident/:id", post(delete_incident))
        .route("/view_data", get(view_data))
}

#[derive(Debug, Deserialize)]
struct ReportForm {
    location: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    cause: String,
    #[serde(default)]
    pincode: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ForwardForm {
    incident_id: i64,
}

#[derive(Debug, Deserialize)]
struct ViewDataQuery {
    #[serde(rename = "type", default)]
    data_type: Option<String>,
}

async fn report_incident(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ReportForm>,
) -> Result<Json<Value>, AppError> {
    let pincode = form.pincode.trim();
    if pincode.is_empty() {
        return Err(AppError::ValidationError("Pincode is required.".to_string()));
    }

    let payload = json!({
        "user_id": user.id,
        "location": form.location.trim(),
        "address": none_if_empty(&form.address),
        "city": none_if_empty(&form.city),
        "state": none_if_empty(&form.state),
        "cause": none_if_empty(&form.cause),
        "pincode": pincode,
        "description": form.description.trim(),
        "status": "pending",
    });

    let inserted: Vec<Value> = state
        .store()?
        .table("incidents")
        .insert(&payload)
        .await?;

    match inserted.first().and_then(|r| r.get("id")).and_then(Value::as_i64) {
        Some(id) => Ok(Json(json!({
            "status": "success",
            "message": "Incident reported successfully!",
            "incident_id": id,
        }))),
        None => Ok(Json(json!({
            "status": "danger",
            "message": "Could not report incident.",
        }))),
    }
}

/// Admin verifies a report and hands it to government: the incident is
/// marked forwarded, a pending request is filed, a public warning goes
/// out, and residents near the pincode get an SMS.
async fn forward_incident(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Form(form): Form<ForwardForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let incident: Incident = store
        .table("incidents")
        .select("*")
        .eq("id", form.incident_id)
        .fetch_optional()
        .await?
        .ok_or_else(|| AppError::NotFound("Incident".to_string()))?;

    if incident.status.as_deref() == Some("forwarded") {
        return Ok(Json(json!({
            "status": "warning",
            "message": "This incident has already been forwarded to government",
        })));
    }

    store
        .table("incidents")
        .eq("id", incident.id)
        .update::<_, Value>(&json!({
            "status": "forwarded",
            "forwarded_at": Utc::now().to_rfc3339(),
        }))
        .await?;

    store
        .table("requests")
        .insert::<_, Value>(&json!({
            "admin_id": admin.id,
            "incident_id": incident.id,
            "status": "pending",
        }))
        .await?;

    announcements::create_disaster_announcement(store, admin.id, &incident).await?;

    if state.sms.is_live() {
        let recipients = sms::nearby_users(
            store,
            incident.pincode.as_deref(),
            None,
            None,
            SMS_RADIUS_KM,
        )
        .await?;
        let message = sms::incident_message(&incident);
        let mut queued = 0;
        for user in recipients {
            if let Some(phone) = user.phone {
                let _ = state.sms_queue.send(SmsJob {
                    incident_id: Some(incident.id),
                    user_id: Some(user.id),
                    phone,
                    message: message.clone(),
                    attempt: 0,
                });
                queued += 1;
            }
        }
        info!(
            "Queued {} alert SMS for incident #{}",
            queued, incident.id
        );
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Incident forwarded to government successfully!",
    })))
}

async fn delete_incident(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state
        .store()?
        .table("incidents")
        .eq("id", id)
        .delete()
        .await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Incident deleted successfully!",
    })))
}

/// The caller's own incident reports or donations, newest first.
async fn view_data(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ViewDataQuery>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;
    let data_type = query
        .data_type
        .as_deref()
        .unwrap_or("incidents")
        .to_lowercase();

    if data_type == "donations" {
        let rows: Vec<Donation> = store
            .table("donations")
            .select("id, amount, method, timestamp")
            .eq("user_id", user.id)
            .order("timestamp", true)
            .fetch()
            .await?;
        return Ok(Json(json!({
            "type": "donations",
            "columns": ["id", "amount", "method", "timestamp"],
            "rows": rows,
        })));
    }

    let rows: Vec<Incident> = store
        .table("incidents")
        .select("id, location, description, status, timestamp")
        .eq("user_id", user.id)
        .order("timestamp", true)
        .fetch()
        .await?;
    Ok(Json(json!({
        "type": "incidents",
        "columns": ["id", "location", "description", "status", "timestamp"],
        "rows": rows,
    })))
}

fn none_if_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
