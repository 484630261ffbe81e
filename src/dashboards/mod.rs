//! Role dashboards: JSON aggregates backing each role's home screen.

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Form, Router,
};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

use crate::auth::{AdminUser, CurrentUser, EmergencyUser, GovernmentUser, Role};
use crate::error::AppError;
use crate::incidents::consolidate;
use crate::state::AppState;
use crate::store::models::{
    Announcement, Donation, EmergencyAssignment, EmergencyNotification, EmergencyUnit,
    EmergencyUpdate, GovernmentUpdate, Incident, MedicalRequest, RequestRow, TeamAllocation, User,
    WeatherRecord,
};
use crate::weather::monitor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/admin_dashboard", get(admin_dashboard))
        .route("/government_dashboard", get(government_dashboard))
        .route("/emergency_dashboard", get(emergency_dashboard))
        .route("/admin/data_view", get(admin_data_view))
        .route("/medical", post(submit_medical_request))
}

/// Role-dispatched landing: privileged roles are pointed at their own
/// dashboards, plain users get announcements and live weather alerts.
async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    match user.role {
        Role::Admin => return Ok(Json(json!({"redirect": "/admin_dashboard"}))),
        Role::Government => return Ok(Json(json!({"redirect": "/government_dashboard"}))),
        Role::Emergency => return Ok(Json(json!({"redirect": "/emergency_dashboard"}))),
        Role::User => {}
    }

    let mut announcements: Vec<Announcement> = Vec::new();
    if state.store_available() {
        if let Err(err) = monitor::refresh_weather_alerts(&state).await {
            warn!("Weather alert upkeep failed: {}", err);
        }
        match state
            .store()?
            .table("announcements")
            .select("*, weather_data(*)")
            .order("timestamp", true)
            .limit(5)
            .fetch()
            .await
        {
            Ok(rows) => announcements = rows,
            Err(err) => warn!("Error loading announcements: {}", err),
        }
    }

    let weather_alerts: Vec<Announcement> = announcements
        .iter()
        .filter(|a| a.is_weather_alert == Some(true))
        .cloned()
        .collect();

    Ok(Json(json!({
        "user": user.name,
        "announcements": announcements,
        "weather_alerts": weather_alerts,
    })))
}

async fn admin_dashboard(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    if let Err(err) = monitor::refresh_weather_alerts(&state).await {
        warn!("Weather alert upkeep failed: {}", err);
    }

    let all_incidents: Vec<Incident> = store
        .table("incidents")
        .select("*")
        .order("timestamp", true)
        .fetch()
        .await?;
    let total_incidents = all_incidents.len();
    let forwarded_count = all_incidents
        .iter()
        .filter(|i| i.status.as_deref() == Some("forwarded"))
        .count();

    let (forwarded, pending): (Vec<Incident>, Vec<Incident>) = all_incidents
        .into_iter()
        .partition(|i| i.status.as_deref() == Some("forwarded"));
    let pending_incidents = consolidate::consolidate_by_pincode(pending);
    let forwarded_incidents = consolidate::consolidate_by_pincode(forwarded);

    let donations: Vec<Donation> = store
        .table("donations")
        .select("*")
        .fetch()
        .await
        .unwrap_or_default();
    let settled: Vec<&Donation> = donations.iter().filter(|d| d.is_settled()).collect();
    let total_donations = settled.len();
    let total_amount: f64 = settled.iter().filter_map(|d| d.amount).sum();

    let announcements: Vec<Announcement> = store
        .table("announcements")
        .select("*")
        .order("timestamp", true)
        .limit(10)
        .fetch()
        .await?;

    let admin_operations = operations_overview(&state).await.unwrap_or_else(|err| {
        warn!("Operations overview failed: {}", err);
        Vec::new()
    });

    let admin_updates: Vec<GovernmentUpdate> = store
        .table("government_emergency_updates")
        .select("update_id, assignment_id, team_name, assignment_status, rescued_count, critical_count, severity, message, update_time, location, city, state")
        .limit(20)
        .fetch()
        .await
        .unwrap_or_default();

    let weather_data: Vec<WeatherRecord> = store
        .table("weather_data")
        .select("*")
        .order("fetched_at", true)
        .order("is_extreme", true)
        .limit(15)
        .fetch()
        .await?;

    Ok(Json(json!({
        "pending_incidents": pending_incidents,
        "forwarded_incidents": forwarded_incidents,
        "announcements": announcements,
        "admin_operations": admin_operations,
        "admin_updates": admin_updates,
        "weather_data": weather_data,
        "total_incidents": total_incidents,
        "forwarded_incidents_count": forwarded_count,
        "total_donations": total_donations,
        "total_amount": total_amount,
        "sms_configured": state.sms.is_live(),
    })))
}

/// Assignments joined with their unit, lead and update rollups. The
/// lookups run as separate id-list queries rather than nested embeds.
async fn operations_overview(state: &AppState) -> Result<Vec<Value>, AppError> {
    let store = state.store()?;

    let assignments: Vec<EmergencyAssignment> = store
        .table("emergency_assignments")
        .select("*, requests(*, incidents(*))")
        .order("assigned_at", true)
        .limit(50)
        .fetch()
        .await?;
    if assignments.is_empty() {
        return Ok(Vec::new());
    }

    let lead_ids: Vec<Uuid> = assignments
        .iter()
        .filter_map(|a| a.team_lead_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let unit_ids: Vec<i64> = assignments
        .iter()
        .filter_map(|a| a.unit_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let assignment_ids: Vec<i64> = assignments.iter().map(|a| a.id).collect();

    let mut users_map: HashMap<Uuid, User> = HashMap::new();
    if !lead_ids.is_empty() {
        let users: Vec<User> = store
            .table("users")
            .select("id, name")
            .in_list("id", &lead_ids)
            .fetch()
            .await
            .unwrap_or_default();
        users_map = users.into_iter().map(|u| (u.id, u)).collect();
    }

    let mut units_map: HashMap<i64, EmergencyUnit> = HashMap::new();
    if !unit_ids.is_empty() {
        let units: Vec<EmergencyUnit> = store
            .table("emergency_units")
            .select("id, unit_name, unit_category")
            .in_list("id", &unit_ids)
            .fetch()
            .await
            .unwrap_or_default();
        units_map = units.into_iter().map(|u| (u.id, u)).collect();
    }

    // Per-assignment rescued totals and the latest update time.
    let mut rollups: HashMap<i64, (i64, Option<chrono::DateTime<chrono::Utc>>)> = HashMap::new();
    let updates: Vec<EmergencyUpdate> = store
        .table("emergency_updates")
        .select("assignment_id, rescued_count, created_at, id")
        .in_list("assignment_id", &assignment_ids)
        .fetch()
        .await
        .unwrap_or_default();
    for update in updates {
        let Some(assignment_id) = update.assignment_id else {
            continue;
        };
        let entry = rollups.entry(assignment_id).or_insert((0, None));
        entry.0 += update.rescued_count.unwrap_or(0);
        if update.created_at > entry.1 {
            entry.1 = update.created_at;
        }
    }

    let mut overview = Vec::new();
    for assignment in &assignments {
        let incident = assignment
            .requests
            .as_ref()
            .and_then(|r| r.incidents.as_ref());
        let lead = assignment.team_lead_id.and_then(|id| users_map.get(&id));
        let unit = assignment.unit_id.and_then(|id| units_map.get(&id));
        let (rescued, last_update) = rollups
            .get(&assignment.id)
            .cloned()
            .unwrap_or((0, assignment.assigned_at));

        let team = unit
            .and_then(|u| u.unit_name.clone())
            .or_else(|| lead.and_then(|l| l.name.clone()))
            .or_else(|| assignment.team_name.clone())
            .unwrap_or_else(|| "Emergency Team".to_string());

        overview.push(json!({
            "assignment_id": assignment.id,
            "incident_id": assignment.requests.as_ref().and_then(|r| r.incident_id),
            "incident_location": incident
                .and_then(|i| i.location.clone())
                .or_else(|| assignment.location_text.clone()),
            "team": team,
            "team_type": unit
                .and_then(|u| u.unit_category.clone())
                .or_else(|| assignment.team_type.clone()),
            "status": assignment.status.clone().unwrap_or_else(|| "Assigned".to_string()),
            "rescued": rescued,
            "updated_at": last_update,
        }));
    }
    Ok(overview)
}

async fn government_dashboard(
    State(state): State<AppState>,
    _gov: GovernmentUser,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let pending: Vec<RequestRow> = store
        .table("requests")
        .select("*, incidents(*)")
        .eq("status", "pending")
        .order("timestamp", true)
        .limit(50)
        .fetch()
        .await?;
    let notified: Vec<RequestRow> = store
        .table("requests")
        .select("*, incidents(*)")
        .eq("status", "notified")
        .order("timestamp", true)
        .limit(50)
        .fetch()
        .await?;

    let pending_requests_list = consolidate::group_requests_by_pincode(pending);
    let notified_requests_list = consolidate::group_requests_by_pincode(notified);
    let total_requests = pending_requests_list.len() + notified_requests_list.len();
    let pending_requests = pending_requests_list.len();

    let team_allocations: Vec<TeamAllocation> = store
        .table("team_allocations")
        .select("*")
        .order("assigned_at", true)
        .limit(10)
        .fetch()
        .await?;

    let assignments: Vec<EmergencyAssignment> = store
        .table("emergency_assignments")
        .select("*, requests(*, incidents(*))")
        .order("assigned_at", true)
        .limit(25)
        .fetch()
        .await?;

    let active_assignments = assignments
        .iter()
        .filter(|a| {
            matches!(
                a.status.as_deref().map(|s| s.to_lowercase()).as_deref(),
                Some("assigned") | Some("enroute") | Some("onsite")
            )
        })
        .count();

    // Enrich with lead and unit details; nested embeds across two
    // foreign keys are not reliable on the hosted layer.
    let lead_ids: Vec<Uuid> = assignments
        .iter()
        .filter_map(|a| a.team_lead_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let unit_ids: Vec<i64> = assignments
        .iter()
        .filter_map(|a| a.unit_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut users_map: HashMap<Uuid, User> = HashMap::new();
    if !lead_ids.is_empty() {
        if let Ok(users) = store
            .table("users")
            .select("id, name, email")
            .in_list("id", &lead_ids)
            .fetch::<User>()
            .await
        {
            users_map = users.into_iter().map(|u| (u.id, u)).collect();
        }
    }
    let mut units_map: HashMap<i64, EmergencyUnit> = HashMap::new();
    if !unit_ids.is_empty() {
        if let Ok(units) = store
            .table("emergency_units")
            .select("id, unit_name, unit_category")
            .in_list("id", &unit_ids)
            .fetch::<EmergencyUnit>()
            .await
        {
            units_map = units.into_iter().map(|u| (u.id, u)).collect();
        }
    }

    let emergency_assignments: Vec<Value> = assignments
        .iter()
        .map(|assignment| {
            let mut row = serde_json::to_value(assignment).unwrap_or(Value::Null);
            if let Value::Object(ref mut map) = row {
                if let Some(lead) = assignment.team_lead_id.and_then(|id| users_map.get(&id)) {
                    map.insert("team_lead_name".to_string(), json!(lead.name));
                    map.insert("team_lead_email".to_string(), json!(lead.email));
                }
                if let Some(unit) = assignment.unit_id.and_then(|id| units_map.get(&id)) {
                    map.insert("unit_name".to_string(), json!(unit.unit_name));
                    map.insert("unit_category".to_string(), json!(unit.unit_category));
                }
            }
            row
        })
        .collect();

    let emergency_heads = fetch_emergency_heads(store).await;

    let all_units: Vec<EmergencyUnit> = store
        .table("emergency_units")
        .select("id, unit_name, unit_category, status, head_id, users(name)")
        .order("unit_name", false)
        .fetch()
        .await?;
    let emergency_units: Vec<&EmergencyUnit> = all_units
        .iter()
        .filter(|u| u.status.as_deref() == Some("Free"))
        .collect();

    let emergency_updates: Vec<GovernmentUpdate> = store
        .table("government_emergency_updates")
        .select("update_id, assignment_id, team_name, assignment_status, rescued_count, critical_count, severity, message, update_time, location, city, state")
        .limit(20)
        .fetch()
        .await
        .unwrap_or_default();

    Ok(Json(json!({
        "pending_requests_list": pending_requests_list,
        "notified_requests_list": notified_requests_list,
        "team_allocations": team_allocations,
        "emergency_assignments": emergency_assignments,
        "emergency_heads": emergency_heads,
        "emergency_units": emergency_units,
        "emergency_updates": emergency_updates,
        "total_requests": total_requests,
        "pending_requests": pending_requests,
        "active_assignments": active_assignments,
    })))
}

/// Flagged heads when the column exists, otherwise every emergency
/// user (older deployments miss `is_emergency_head`).
async fn fetch_emergency_heads(store: &crate::store::Store) -> Vec<User> {
    match store
        .table("users")
        .select("id, name, email, is_emergency_head")
        .eq("role", Role::Emergency.as_str())
        .eq("is_emergency_head", "true")
        .fetch::<User>()
        .await
    {
        Ok(heads) => heads,
        Err(_) => store
            .table("users")
            .select("id, name, email")
            .eq("role", Role::Emergency.as_str())
            .fetch()
            .await
            .unwrap_or_default(),
    }
}

async fn emergency_dashboard(
    State(state): State<AppState>,
    EmergencyUser(user): EmergencyUser,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let all_assignments: Vec<EmergencyAssignment> = store
        .table("emergency_assignments")
        .select("*, requests(*, incidents(*))")
        .eq("team_lead_id", user.id)
        .order("assigned_at", true)
        .fetch()
        .await?;

    let (completed, current): (Vec<EmergencyAssignment>, Vec<EmergencyAssignment>) =
        all_assignments
            .iter()
            .cloned()
            .partition(|a| a.status.as_deref() == Some("Completed"));

    // Group concurrent team assignments for one request into a single
    // row with the extra teams attached.
    let mut grouped: Vec<Value> = Vec::new();
    let mut by_request: HashMap<Option<i64>, Vec<&EmergencyAssignment>> = HashMap::new();
    let mut order: Vec<Option<i64>> = Vec::new();
    for assignment in &current {
        if !by_request.contains_key(&assignment.request_id) {
            order.push(assignment.request_id);
        }
        by_request
            .entry(assignment.request_id)
            .or_default()
            .push(assignment);
    }
    for request_id in order {
        let team_assignments = &by_request[&request_id];
        let mut row = serde_json::to_value(team_assignments[0]).unwrap_or(Value::Null);
        if let Value::Object(ref mut map) = row {
            map.insert(
                "additional_teams".to_string(),
                json!(team_assignments[1..].to_vec()),
            );
        }
        grouped.push(row);
    }

    let assignment_ids: Vec<i64> = all_assignments.iter().map(|a| a.id).collect();
    let mut rescued_count: i64 = 0;
    let mut updates_map: Map<String, Value> = Map::new();
    if !assignment_ids.is_empty() {
        let updates: Vec<EmergencyUpdate> = store
            .table("emergency_updates")
            .select("*")
            .in_list("assignment_id", &assignment_ids)
            .order("created_at", true)
            .fetch()
            .await
            .unwrap_or_default();

        rescued_count = updates.iter().filter_map(|u| u.rescued_count).sum();

        let mut per_assignment: HashMap<i64, Vec<&EmergencyUpdate>> = HashMap::new();
        for update in &updates {
            if let Some(id) = update.assignment_id {
                per_assignment.entry(id).or_default().push(update);
            }
        }
        for (assignment_id, mut list) in per_assignment {
            list.truncate(3);
            updates_map.insert(assignment_id.to_string(), json!(list));
        }
    }

    let notifications: Vec<EmergencyNotification> = store
        .table("emergency_notifications")
        .select("*, requests(*, incidents(*))")
        .eq("head_id", user.id)
        .order("created_at", true)
        .fetch()
        .await
        .unwrap_or_default();

    let my_units: Vec<EmergencyUnit> = store
        .table("emergency_units")
        .select("*")
        .eq("head_id", user.id)
        .order("unit_name", false)
        .fetch()
        .await
        .unwrap_or_default();

    let active_assignments = grouped.len();
    let completed_tasks = completed.len();
    Ok(Json(json!({
        "assignments": grouped,
        "completed_assignments": completed,
        "updates_map": updates_map,
        "notifications": notifications,
        "my_units": my_units,
        "total_assignments": all_assignments.len(),
        "active_assignments": active_assignments,
        "rescued_count": rescued_count,
        "completed_tasks": completed_tasks,
    })))
}

async fn admin_data_view(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let incidents: Vec<Incident> = store
        .table("incidents")
        .select("*")
        .order("timestamp", true)
        .fetch()
        .await?;
    let donations: Vec<Donation> = store
        .table("donations")
        .select("*")
        .order("timestamp", true)
        .fetch()
        .await
        .unwrap_or_default();
    // Never expose phone numbers or addresses here.
    let users: Vec<User> = store
        .table("users")
        .select("id, name, email, role, created_at")
        .order("created_at", true)
        .fetch()
        .await?;
    let announcements: Vec<Announcement> = store
        .table("announcements")
        .select("*")
        .order("timestamp", true)
        .fetch()
        .await?;
    let medical_requests: Vec<MedicalRequest> = store
        .table("medical_requests")
        .select("*")
        .order("created_at", true)
        .fetch()
        .await
        .unwrap_or_default();
    let weather_data: Vec<WeatherRecord> = store
        .table("weather_data")
        .select("*")
        .order("fetched_at", true)
        .limit(50)
        .fetch()
        .await?;

    Ok(Json(json!({
        "incidents": incidents,
        "donations": donations,
        "users": users,
        "announcements": announcements,
        "medical_requests": medical_requests,
        "weather_data": weather_data,
    })))
}

#[derive(Debug, serde::Deserialize)]
struct MedicalForm {
    request_type: String,
    #[serde(default)]
    description: String,
    urgency: String,
}

async fn submit_medical_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<MedicalForm>,
) -> Result<Json<Value>, AppError> {
    let inserted: Vec<Value> = state
        .store()?
        .table("medical_requests")
        .insert(&json!({
            "user_id": user.id,
            "request_type": form.request_type,
            "description": form.description,
            "urgency": form.urgency,
        }))
        .await?;

    if inserted.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Could not submit request.",
        })));
    }
    Ok(Json(json!({
        "status": "success",
        "message": "Medical request submitted!",
    })))
}
