//! Government-side request handling: accepting requests, notifying
//! emergency heads, allocating teams and closing out resolved
//! disasters.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::post,
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::announcements;
use crate::auth::{CurrentUser, GovernmentUser, Role};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::models::{EmergencyAssignment, EmergencyUnit, RequestRow, User};
use crate::store::Store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/allocate_team", post(allocate_team))
        .route("/notify_emergency_head", post(notify_emergency_head))
        .route("/accept_request/:id", post(accept_request))
        .route("/assign_emergency_team/:id", post(assign_emergency_team))
        .route("/assign_more_teams", post(assign_more_teams))
        .route("/notify_admin_resolved", post(notify_admin_resolved))
        .route("/gov/delete_incident/:id", post(gov_delete_incident))
        .route("/delete_update/:id", post(delete_update))
}

#[derive(Debug, Deserialize)]
struct AllocateForm {
    request_id: i64,
    team_name: String,
}

#[derive(Debug, Deserialize)]
struct NotifyForm {
    request_id: i64,
}

#[derive(Debug, Deserialize)]
struct AssignMoreForm {
    assignment_id: i64,
    /// Comma-separated unit ids (multi-select field).
    unit_ids: String,
    #[serde(default)]
    notes: String,
}

#[derive(Debug, Deserialize)]
struct ResolvedForm {
    request_id: i64,
    #[serde(default)]
    resolution_notes: String,
}

async fn allocate_team(
    State(state): State<AppState>,
    GovernmentUser(gov): GovernmentUser,
    Form(form): Form<AllocateForm>,
) -> Result<Json<Value>, AppError> {
    if form.team_name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Request ID and team name are required".to_string(),
        ));
    }

    let inserted: Vec<Value> = state
        .store()?
        .table("team_allocations")
        .insert(&json!({
            "gov_id": gov.id,
            "request_id": form.request_id,
            "team_name": form.team_name,
        }))
        .await?;

    if inserted.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Could not allocate team.",
        })));
    }
    Ok(Json(json!({
        "status": "success",
        "message": "Team allocated successfully!",
    })))
}

/// Emergency heads in notification priority order: flagged heads
/// first, then anyone with an emergency role, then unit owners.
async fn resolve_emergency_heads(store: &Store) -> Result<Vec<Uuid>, AppError> {
    let users: Vec<User> = store
        .table("users")
        .select("id, role, is_emergency_head")
        .fetch()
        .await?;

    let mut heads: Vec<Uuid> = users
        .iter()
        .filter(|u| u.is_emergency_head == Some(true))
        .map(|u| u.id)
        .collect();

    if heads.is_empty() {
        heads = users
            .iter()
            .filter(|u| {
                u.role
                    .as_deref()
                    .map(|r| r.to_lowercase().contains("emergency"))
                    .unwrap_or(false)
            })
            .map(|u| u.id)
            .collect();
    }

    if heads.is_empty() {
        let units: Vec<EmergencyUnit> = store
            .table("emergency_units")
            .select("id, head_id")
            .fetch()
            .await?;
        let mut seen = std::collections::HashSet::new();
        heads = units
            .into_iter()
            .filter_map(|u| u.head_id)
            .filter(|id| seen.insert(*id))
            .collect();
    }

    Ok(heads)
}

async fn notify_emergency_head(
    State(state): State<AppState>,
    GovernmentUser(gov): GovernmentUser,
    Form(form): Form<NotifyForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    // Refuse double notification.
    let existing: Option<Value> = store
        .table("emergency_notifications")
        .select("id")
        .eq("request_id", form.request_id)
        .fetch_optional()
        .await?;
    if existing.is_some() {
        return Ok(Json(json!({
            "status": "warning",
            "message": "This incident has already been notified to emergency teams. \
                        Status: Notified - Waiting for emergency team response.",
        })));
    }

    let request: Option<RequestRow> = store
        .table("requests")
        .select("id, status")
        .eq("id", form.request_id)
        .fetch_optional()
        .await?;
    if let Some(status) = request.and_then(|r| r.status) {
        if matches!(status.as_str(), "notified" | "assigned" | "completed") {
            return Ok(Json(json!({
                "status": "warning",
                "message": format!(
                    "This incident has already been processed. Current status: {}",
                    status
                ),
            })));
        }
    }

    let heads = resolve_emergency_heads(store).await?;
    if heads.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "No emergency team users found to notify.",
        })));
    }

    let payloads: Vec<Value> = heads
        .iter()
        .map(|head_id| {
            json!({
                "request_id": form.request_id,
                "gov_id": gov.id,
                "head_id": head_id,
                "status": "Pending",
            })
        })
        .collect();
    store
        .table("emergency_notifications")
        .insert::<_, Value>(&payloads)
        .await?;

    if let Err(err) = store
        .table("requests")
        .eq("id", form.request_id)
        .update::<_, Value>(&json!({
            "status": "notified",
            "notified_at": Utc::now().to_rfc3339(),
        }))
        .await
    {
        warn!("Request status update failed after notification: {}", err);
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Notification sent to emergency teams. Status set to Notified.",
    })))
}

async fn accept_request(
    State(state): State<AppState>,
    _gov: GovernmentUser,
    Path(request_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let updated: Vec<Value> = state
        .store()?
        .table("requests")
        .eq("id", request_id)
        .update(&json!({
            "status": "accepted",
            "accepted_at": Utc::now().to_rfc3339(),
        }))
        .await?;

    if updated.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Failed to accept request.",
        })));
    }
    Ok(Json(json!({
        "status": "success",
        "message": "Request accepted successfully!",
    })))
}

async fn assign_emergency_team(
    State(state): State<AppState>,
    _gov: GovernmentUser,
    Path(request_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let updated: Vec<Value> = state
        .store()?
        .table("requests")
        .eq("id", request_id)
        .update(&json!({
            "status": "assigned",
            "assigned_at": Utc::now().to_rfc3339(),
        }))
        .await?;

    if updated.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Failed to set request to Assigned.",
        })));
    }
    Ok(Json(json!({
        "status": "success",
        "message": "Emergency team(s) assigned. Status set to Assigned!",
    })))
}

/// Attach additional units to an ongoing assignment, spreading them
/// over the available heads round-robin.
async fn assign_more_teams(
    State(state): State<AppState>,
    _gov: GovernmentUser,
    Form(form): Form<AssignMoreForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let unit_ids: Vec<i64> = form
        .unit_ids
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    if unit_ids.is_empty() {
        return Err(AppError::ValidationError(
            "Assignment ID and at least one unit are required".to_string(),
        ));
    }

    let original: EmergencyAssignment = store
        .table("emergency_assignments")
        .select("*, requests(*, incidents(*))")
        .eq("id", form.assignment_id)
        .fetch_optional()
        .await?
        .ok_or_else(|| AppError::NotFound("Original assignment".to_string()))?;

    let incident = original
        .requests
        .as_ref()
        .and_then(|r| r.incidents.clone())
        .ok_or_else(|| AppError::NotFound("Original incident".to_string()))?;

    let heads: Vec<User> = store
        .table("users")
        .select("id, name, email")
        .eq("role", Role::Emergency.as_str())
        .limit(10)
        .fetch()
        .await?;
    if heads.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "No emergency heads available",
        })));
    }

    let mut created = 0usize;
    for unit_id in unit_ids {
        let unit: Option<EmergencyUnit> = store
            .table("emergency_units")
            .select("*, users(name, email)")
            .eq("id", unit_id)
            .fetch_optional()
            .await?;
        let Some(unit) = unit else {
            continue;
        };

        let head = &heads[created % heads.len()];
        let inserted: Vec<Value> = store
            .table("emergency_assignments")
            .insert(&json!({
                "request_id": original.request_id,
                "team_lead_id": head.id,
                "unit_id": unit_id,
                "status": "Assigned",
                "assigned_at": Utc::now().to_rfc3339(),
                "notes": format!("Additional team assignment. {}", form.notes).trim(),
            }))
            .await?;
        if inserted.is_empty() {
            continue;
        }
        created += 1;

        store
            .table("emergency_notifications")
            .insert::<_, Value>(&json!({
                "head_id": head.id,
                "request_id": original.request_id,
                "message": format!(
                    "Additional team assignment for incident at {}. Unit: {}",
                    incident.location.as_deref().unwrap_or("Emergency Location"),
                    unit.unit_name.as_deref().unwrap_or("Emergency Unit"),
                ),
                "status": "Pending",
            }))
            .await?;
    }

    if created == 0 {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Failed to assign additional teams",
        })));
    }
    Ok(Json(json!({
        "status": "success",
        "message": format!("Successfully assigned {} additional team(s)!", created),
    })))
}

/// Close out a resolved disaster: incident → resolved, request →
/// completed, and a resolution announcement so the admin can retire
/// the public warning.
async fn notify_admin_resolved(
    State(state): State<AppState>,
    GovernmentUser(gov): GovernmentUser,
    Form(form): Form<ResolvedForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let request: RequestRow = store
        .table("requests")
        .select("*, incidents(*)")
        .eq("id", form.request_id)
        .fetch_optional()
        .await?
        .ok_or_else(|| AppError::NotFound("Request".to_string()))?;
    let incident = request
        .incidents
        .ok_or_else(|| AppError::NotFound("Incident data".to_string()))?;

    store
        .table("incidents")
        .eq("id", incident.id)
        .update::<_, Value>(&json!({
            "status": "resolved",
            "resolved_at": Utc::now().to_rfc3339(),
        }))
        .await?;

    store
        .table("requests")
        .eq("id", form.request_id)
        .update::<_, Value>(&json!({
            "status": "completed",
            "completed_at": Utc::now().to_rfc3339(),
        }))
        .await?;

    let admin_id = announcements::any_admin_id(store).await.unwrap_or(gov.id);
    let location = incident.location.as_deref().unwrap_or("Emergency Location");
    let notes = if form.resolution_notes.trim().is_empty() {
        "Emergency response completed successfully. All affected areas have been \
         secured and assistance provided."
            .to_string()
    } else {
        form.resolution_notes.trim().to_string()
    };

    let description = format!(
        "🎉 DISASTER RESOLUTION CONFIRMED 🎉\n\n\
         Location: {location}\n\
         Pincode: {pincode}\n\
         Original Incident ID: #{incident_id}\n\
         Request ID: #{request_id}\n\n\
         ✅ STATUS: DISASTER SUCCESSFULLY RESOLVED\n\
         📅 Resolved: {resolved_at}\n\
         👥 Resolved by: Government Emergency Response Team\n\n\
         📝 Resolution Notes:\n{notes}\n\n\
         🔔 ADMIN ACTION REQUIRED:\n\
         Please review and consider removing the disaster announcement for this \
         location as the emergency has been resolved.\n\n\
         Stay safe and thank you for your coordination.\n\
         - Government Emergency Management Team",
        location = location,
        pincode = incident.pincode.as_deref().unwrap_or("Not specified"),
        incident_id = incident.id,
        request_id = form.request_id,
        resolved_at = Utc::now().format("%Y-%m-%d %H:%M:%S"),
        notes = notes,
    );

    let inserted: Vec<Value> = store
        .table("announcements")
        .insert(&json!({
            "admin_id": admin_id,
            "title": format!("✅ DISASTER RESOLVED - {}", location),
            "description": description,
            "severity": "low",
            "is_weather_alert": false,
        }))
        .await?;

    if inserted.is_empty() {
        return Ok(Json(json!({
            "status": "warning",
            "message": "Disaster marked as resolved but failed to notify admin.",
        })));
    }
    Ok(Json(json!({
        "status": "success",
        "message": "Disaster marked as resolved! Admin has been notified to review announcements.",
    })))
}

async fn gov_delete_incident(
    State(state): State<AppState>,
    _gov: GovernmentUser,
    Path(incident_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state
        .store()?
        .table("incidents")
        .eq("id", incident_id)
        .delete()
        .await?;
    Ok(Json(json!({"status": "success", "message": "Incident deleted."})))
}

/// Government may delete any field update; emergency users only their
/// own.
async fn delete_update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(update_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if !matches!(user.role, Role::Government | Role::Emergency) {
        return Err(AppError::AccessDenied);
    }
    let store = state.store()?;

    if user.role == Role::Emergency {
        let row: Option<Value> = store
            .table("emergency_updates")
            .select("id, author_id")
            .eq("id", update_id)
            .fetch_optional()
            .await?;
        let owned = row
            .and_then(|r| {
                r.get("author_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok())
            })
            .map(|author| author == user.id)
            .unwrap_or(false);
        if !owned {
            return Err(AppError::NotFound("Update".to_string()));
        }
    }

    store
        .table("emergency_updates")
        .eq("id", update_id)
        .delete()
        .await?;
    Ok(Json(json!({"status": "success", "message": "Update deleted."})))
}
