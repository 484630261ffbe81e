//! Emergency-team operations: unit management, assignments, field
//! updates and escalation back to government.

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
use crate::auth::EmergencyUser;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::models::{EmergencyAssignment, EmergencyUnit, Incident, RequestRow};
use crate::store::Store;

/// Every head's team is created with this fixed set of subteams.
const UNIT_CATEGORIES: [&str; 4] = ["Rescue", "Escort", "Medical", "ResourceCollector"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create_unit", post(create_unit))
        .route("/head_assign_unit", post(head_assign_unit))
        .route("/toggle_unit_status", post(toggle_unit_status))
        .route("/delete_notification", post(delete_notification))
        .route("/emergency_update", post(emergency_update))
        .route(
            "/update_assignment_status/:id",
            post(update_assignment_status),
        )
        .route("/report_assignment_update", post(report_assignment_update))
        .route("/complete_assignment", post(complete_assignment))
        .route(
            "/request_additional_support",
            post(request_additional_support),
        )
}

#[derive(Debug, Deserialize)]
struct CreateUnitForm {
    unit_name: String,
}

#[derive(Debug, Deserialize)]
struct HeadAssignForm {
    request_id: i64,
    unit_id: i64,
}

#[derive(Debug, Deserialize)]
struct ToggleUnitForm {
    unit_id: i64,
}

#[derive(Debug, Deserialize)]
struct DeleteNotificationForm {
    notification_id: i64,
}

#[derive(Debug, Deserialize)]
struct UpdateForm {
    assignment_id: i64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reached: Option<String>,
    #[serde(default)]
    rescued_count: Option<i64>,
    #[serde(default)]
    need_more_support: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    critical_count: Option<i64>,
    #[serde(default)]
    need_medical: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusForm {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ReportUpdateForm {
    assignment_id: i64,
    #[serde(default)]
    rescued_count: Option<i64>,
    #[serde(default)]
    critical_count: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompleteForm {
    assignment_id: i64,
    #[serde(default)]
    completion_notes: String,
}

#[derive(Debug, Deserialize)]
struct SupportForm {
    assignment_id: i64,
    support_type: String,
    urgency: String,
    #[serde(default)]
    support_message: String,
}

fn checkbox(value: &Option<String>) -> bool {
    value.as_deref() == Some("on")
}

async fn create_unit(
    State(state): State<AppState>,
    EmergencyUser(head): EmergencyUser,
    Form(form): Form<CreateUnitForm>,
) -> Result<Json<Value>, AppError> {
    let unit_name = form.unit_name.trim();
    if unit_name.is_empty() {
        return Err(AppError::ValidationError(
            "Team name is required.".to_string(),
        ));
    }

    let payloads: Vec<Value> = UNIT_CATEGORIES
        .iter()
        .map(|category| {
            json!({
                "head_id": head.id,
                "unit_name": unit_name,
                "unit_category": category,
                "status": "Free",
            })
        })
        .collect();
    state
        .store()?
        .table("emergency_units")
        .insert::<_, Value>(&payloads)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Team created with Rescue, Escort, Medical, and ResourceCollector subteams.",
    })))
}

/// A head dispatches one of their free units to a notified request.
async fn head_assign_unit(
    State(state): State<AppState>,
    EmergencyUser(head): EmergencyUser,
    Form(form): Form<HeadAssignForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let unit: EmergencyUnit = store
        .table("emergency_units")
        .select("*")
        .eq("id", form.unit_id)
        .fetch_optional()
        .await?
        .ok_or_else(|| AppError::NotFound("Unit".to_string()))?;

    store
        .table("emergency_units")
        .eq("id", form.unit_id)
        .update::<_, Value>(&json!({"status": "Busy", "last_update": null}))
        .await?;

    // Carry the incident's location onto the assignment for display.
    let request: Option<RequestRow> = store
        .table("requests")
        .select("id, incident_id")
        .eq("id", form.request_id)
        .fetch_optional()
        .await?;
    let mut location_text = None;
    if let Some(incident_id) = request.and_then(|r| r.incident_id) {
        let incident: Option<Incident> = store
            .table("incidents")
            .select("id, location")
            .eq("id", incident_id)
            .fetch_optional()
            .await?;
        location_text = incident.and_then(|i| i.location);
    }

    store
        .table("emergency_assignments")
        .insert::<_, Value>(&json!({
            "request_id": form.request_id,
            "team_name": unit.unit_name,
            "team_type": unit.unit_category,
            "team_lead_id": head.id,
            "location_text": location_text,
            "notes": format!("Assigned unit #{}", unit.id),
            "status": "Assigned",
        }))
        .await?;

    if let Err(err) = store
        .table("requests")
        .eq("id", form.request_id)
        .update::<_, Value>(&json!({
            "status": "assigned",
            "assigned_at": Utc::now().to_rfc3339(),
        }))
        .await
    {
        warn!("Request status update failed after unit assignment: {}", err);
    }

    store
        .table("emergency_notifications")
        .eq("request_id", form.request_id)
        .eq("head_id", head.id)
        .update::<_, Value>(&json!({"status": "Acknowledged"}))
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Unit assigned and government notified.",
    })))
}

async fn toggle_unit_status(
    State(state): State<AppState>,
    _head: EmergencyUser,
    Form(form): Form<ToggleUnitForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let unit: EmergencyUnit = store
        .table("emergency_units")
        .select("id, head_id, status")
        .eq("id", form.unit_id)
        .fetch_optional()
        .await?
        .ok_or_else(|| AppError::NotFound("Unit".to_string()))?;

    let new_status = if unit.status.as_deref() == Some("Free") {
        "Busy"
    } else {
        "Free"
    };
    store
        .table("emergency_units")
        .eq("id", form.unit_id)
        .update::<_, Value>(&json!({"status": new_status}))
        .await?;

    Ok(Json(json!({"status": "success", "message": "Unit status updated."})))
}

async fn delete_notification(
    State(state): State<AppState>,
    EmergencyUser(head): EmergencyUser,
    Form(form): Form<DeleteNotificationForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let owned: Option<Value> = store
        .table("emergency_notifications")
        .select("id, head_id")
        .eq("id", form.notification_id)
        .eq("head_id", head.id)
        .fetch_optional()
        .await?;
    if owned.is_none() {
        return Err(AppError::NotFound("Notification".to_string()));
    }

    store
        .table("emergency_notifications")
        .eq("id", form.notification_id)
        .delete()
        .await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Notification deleted successfully!",
    })))
}

/// A field update from the team on the ground. Medical or support
/// needs spawn a secondary incident and a fresh government request so
/// the escalation re-enters the normal pipeline.
async fn emergency_update(
    State(state): State<AppState>,
    EmergencyUser(author): EmergencyUser,
    Form(form): Form<UpdateForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let need_more_support = checkbox(&form.need_more_support);
    let need_medical = checkbox(&form.need_medical);

    store
        .table("emergency_updates")
        .insert::<_, Value>(&json!({
            "assignment_id": form.assignment_id,
            "author_id": author.id,
            "reached": checkbox(&form.reached),
            "rescued_count": form.rescued_count,
            "need_more_support": need_more_support,
            "severity": form.severity,
            "critical_count": form.critical_count,
            "need_medical": need_medical,
            "message": form.message,
        }))
        .await?;

    if let Some(status) = form.status.filter(|s| !s.is_empty()) {
        store
            .table("emergency_assignments")
            .eq("id", form.assignment_id)
            .update::<_, Value>(&json!({"status": status}))
            .await?;
    }

    if !(need_medical || need_more_support) {
        return Ok(Json(json!({
            "status": "success",
            "message": "Update sent to government.",
        })));
    }

    let detail = format!(
        "Secondary request from Emergency Team Assignment #{}. {}{}Original message: {}",
        form.assignment_id,
        if need_medical {
            "Medical assistance needed. "
        } else {
            ""
        },
        if need_more_support {
            "Additional support required. "
        } else {
            ""
        },
        form.message.as_deref().unwrap_or("No additional details"),
    );
    let severity = if need_medical { "high" } else { "medium" };

    match spawn_secondary_request(store, author.id, form.assignment_id, &detail, severity).await {
        Ok(true) => Ok(Json(json!({
            "status": "success",
            "message": "Update sent to government. Secondary request created for additional support!",
        }))),
        Ok(false) => Ok(Json(json!({
            "status": "success",
            "message": "Update sent to government.",
        }))),
        Err(err) => {
            warn!("Secondary request creation failed: {}", err);
            Ok(Json(json!({
                "status": "warning",
                "message": "Update sent to government. Failed to create secondary request.",
            })))
        }
    }
}

/// Clone the assignment's original incident into a new pending
/// incident plus a government request. Returns false when the original
/// incident cannot be found.
async fn spawn_secondary_request(
    store: &Store,
    author_id: Uuid,
    assignment_id: i64,
    description: &str,
    severity: &str,
) -> Result<bool, AppError> {
    let assignment: Option<EmergencyAssignment> = store
        .table("emergency_assignments")
        .select("*, requests(*, incidents(*))")
        .eq("id", assignment_id)
        .fetch_optional()
        .await?;
    let Some(original) = assignment
        .and_then(|a| a.requests)
        .and_then(|r| r.incidents)
    else {
        return Ok(false);
    };

    let inserted: Vec<Value> = store
        .table("incidents")
        .insert(&json!({
            "user_id": author_id,
            "location": original
                .location
                .as_deref()
                .unwrap_or("Emergency Location"),
            "address": original.address,
            "city": original.city,
            "state": original.state,
            "pincode": original.pincode,
            "description": description,
            "severity": severity,
            "status": "pending",
        }))
        .await?;
    let Some(incident_id) = inserted
        .first()
        .and_then(|r| r.get("id"))
        .and_then(Value::as_i64)
    else {
        return Ok(false);
    };

    let admin_id = announcements::any_admin_id(store)
        .await
        .unwrap_or(author_id);
    let request: Vec<Value> = store
        .table("requests")
        .insert(&json!({
            "admin_id": admin_id,
            "incident_id": incident_id,
            "status": "pending",
        }))
        .await?;
    Ok(!request.is_empty())
}

async fn update_assignment_status(
    State(state): State<AppState>,
    EmergencyUser(head): EmergencyUser,
    Path(assignment_id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;
    require_assignment_owner(store, assignment_id, head.id).await?;

    let updated: Vec<Value> = store
        .table("emergency_assignments")
        .eq("id", assignment_id)
        .update(&json!({"status": form.status}))
        .await?;
    if updated.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Failed to update assignment status.",
        })));
    }
    Ok(Json(json!({
        "status": "success",
        "message": format!("Assignment status updated to {}!", form.status),
    })))
}

async fn report_assignment_update(
    State(state): State<AppState>,
    EmergencyUser(head): EmergencyUser,
    Form(form): Form<ReportUpdateForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;
    require_assignment_owner(store, form.assignment_id, head.id).await?;

    store
        .table("emergency_updates")
        .insert::<_, Value>(&json!({
            "assignment_id": form.assignment_id,
            "author_id": head.id,
            "rescued_count": form.rescued_count,
            "critical_count": form.critical_count,
            "message": form.message,
        }))
        .await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Assignment update reported successfully!",
    })))
}

async fn complete_assignment(
    State(state): State<AppState>,
    EmergencyUser(head): EmergencyUser,
    Form(form): Form<CompleteForm>,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;
    require_assignment_owner(store, form.assignment_id, head.id).await?;

    let assignment: Option<EmergencyAssignment> = store
        .table("emergency_assignments")
        .select("id, request_id")
        .eq("id", form.assignment_id)
        .fetch_optional()
        .await?;
    let request_id = assignment.and_then(|a| a.request_id);

    let updated: Vec<Value> = store
        .table("emergency_assignments")
        .eq("id", form.assignment_id)
        .update(&json!({
            "status": "Completed",
            "completed_at": Utc::now().to_rfc3339(),
        }))
        .await?;
    if updated.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Failed to complete assignment.",
        })));
    }

    store
        .table("emergency_updates")
        .insert::<_, Value>(&json!({
            "assignment_id": form.assignment_id,
            "author_id": head.id,
            "message": format!("Assignment completed. {}", form.completion_notes).trim(),
            "status": "completed",
        }))
        .await?;

    if let Some(request_id) = request_id {
        store
            .table("requests")
            .eq("id", request_id)
            .update::<_, Value>(&json!({
                "status": "completed",
                "completed_at": Utc::now().to_rfc3339(),
            }))
            .await?;
        store
            .table("emergency_notifications")
            .eq("request_id", request_id)
            .update::<_, Value>(&json!({"status": "Completed"}))
            .await?;
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Assignment completed successfully! Status updated in government dashboard.",
    })))
}

async fn request_additional_support(
    State(state): State<AppState>,
    EmergencyUser(head): EmergencyUser,
    Form(form): Form<SupportForm>,
) -> Result<Json<Value>, AppError> {
    if form.support_type.is_empty() || form.urgency.is_empty() {
        return Err(AppError::ValidationError(
            "All fields are required".to_string(),
        ));
    }
    let store = state.store()?;
    require_assignment_owner(store, form.assignment_id, head.id).await?;

    let description = format!(
        "Support Request: {} - {} urgency. Assignment #{}. {}",
        form.support_type.to_uppercase(),
        form.urgency.to_uppercase(),
        form.assignment_id,
        form.support_message,
    );
    let severity = if matches!(form.urgency.as_str(), "high" | "critical") {
        "high"
    } else {
        "medium"
    };

    let created =
        spawn_secondary_request(store, head.id, form.assignment_id, &description, severity).await?;
    if !created {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Failed to create support request.",
        })));
    }

    store
        .table("emergency_updates")
        .insert::<_, Value>(&json!({
            "assignment_id": form.assignment_id,
            "author_id": head.id,
            "message": format!(
                "Support requested: {} ({} urgency). {}",
                form.support_type, form.urgency, form.support_message
            ),
            "need_more_support": true,
            "support_type": form.support_type,
            "urgency": form.urgency,
        }))
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Support request submitted successfully!",
    })))
}

/// Assignments may only be driven by their team lead.
async fn require_assignment_owner(
    store: &Store,
    assignment_id: i64,
    user_id: Uuid,
) -> Result<(), AppError> {
    let row: Option<Value> = store
        .table("emergency_assignments")
        .select("id, team_lead_id")
        .eq("id", assignment_id)
        .eq("team_lead_id", user_id)
        .fetch_optional()
        .await?;
    if row.is_none() {
        return Err(AppError::NotFound("Assignment".to_string()));
    }
    Ok(())
}
