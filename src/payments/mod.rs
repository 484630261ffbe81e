//! UPI donation collection.
//!
//! Donations are settled out of band through the donor's UPI app; the
//! service renders a deep link as a QR image (fetched from an HTTP QR
//! generator) and tracks the donation row through
//! pending → verified/success.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Form, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_sessions::Session;
use tracing::warn;
use uuid::Uuid;

use crate::auth::{AdminUser, CurrentUser};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::models::Donation;
use crate::store::Store;

const DONATION_INFO_KEY: &str = "donation_info";
const DEFAULT_PURPOSE: &str = "Disaster Relief Donation";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/donate", get(donation_stats).post(donate))
        .route("/donate/success", get(donate_success))
        .route("/donate/confirm", post(donate_confirm))
        .route("/donate/qr", post(create_donation_qr))
        .route("/donate/verify", post(verify_donation))
        .route("/donate/mark_paid", post(mark_donation_paid))
        .route("/donate/status/:id", get(donation_status))
        .route("/donations/pending", get(pending_donations))
        .route("/donations/verify/:id", post(admin_verify_donation))
}

/// Details parked in the session between QR display and confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DonationInfo {
    user_id: Uuid,
    donor_name: String,
    donor_email: String,
    donor_upi: String,
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct DonateForm {
    amount: String,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    donor_name: Option<String>,
    #[serde(default)]
    donor_email: Option<String>,
    #[serde(default)]
    upi_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrRequest {
    amount: f64,
    #[serde(default)]
    donor_name: Option<String>,
    #[serde(default)]
    donor_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    transaction_id: i64,
    #[serde(default)]
    verification_code: Option<String>,
    #[serde(default)]
    sender_upi_id: Option<String>,
}

/// Build the `upi://pay` deep link UPI apps open directly.
pub fn upi_link(upi_id: &str, payee_name: &str, amount: f64, purpose: &str) -> String {
    let encode =
        |s: &str| -> String { url::form_urlencoded::byte_serialize(s.as_bytes()).collect() };
    format!(
        "upi://pay?pa={}&pn={}&am={}&cu=INR&tn={}",
        upi_id,
        encode(payee_name),
        amount,
        encode(purpose),
    )
}

/// Fetch the QR image for a payload and hand it back base64-encoded.
pub async fn qr_png_base64(state: &AppState, data: &str) -> Result<String, AppError> {
    let bytes = state
        .http
        .get(&state.config.qr_base_url)
        .query(&[("size", "300x300"), ("data", data)])
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    Ok(BASE64.encode(&bytes))
}

async fn settled_stats(store: &Store) -> Result<Value, AppError> {
    let all: Vec<Donation> = store
        .table("donations")
        .select("*")
        .order("created_at", true)
        .fetch()
        .await?;

    let settled: Vec<&Donation> = all.iter().filter(|d| d.is_settled()).collect();
    let total_amount: f64 = settled.iter().filter_map(|d| d.amount).sum();
    let recent: Vec<&&Donation> = settled.iter().take(10).collect();

    Ok(json!({
        "total_amount": total_amount,
        "total_count": settled.len(),
        "recent_donations": recent,
    }))
}

async fn donation_stats(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let stats = match state.store() {
        Ok(store) => settled_stats(store).await.unwrap_or_else(|err| {
            warn!("Donation stats failed: {}", err);
            json!({"total_amount": 0, "total_count": 0, "recent_donations": []})
        }),
        Err(_) => json!({"total_amount": 0, "total_count": 0, "recent_donations": []}),
    };
    Ok(Json(json!({ "stats": stats })))
}

async fn donate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
    Form(form): Form<DonateForm>,
) -> Result<Json<Value>, AppError> {
    let amount: f64 = form
        .amount
        .trim()
        .parse()
        .map_err(|_| AppError::ValidationError("Please enter a valid amount".to_string()))?;
    if amount <= 0.0 {
        return Err(AppError::ValidationError(
            "Please enter a valid amount".to_string(),
        ));
    }

    let donor_name = form
        .donor_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| user.name.clone());
    let donor_email = form
        .donor_email
        .filter(|e| !e.trim().is_empty())
        .or_else(|| user.email.clone())
        .unwrap_or_default();

    let store = state.store()?;

    if form.payment_method.as_deref() == Some("upi") {
        if !state.config.is_upi_configured() {
            return Err(AppError::ConfigError(
                "UPI collection is not configured".to_string(),
            ));
        }
        let link = upi_link(&state.config.upi_id, &donor_name, amount, DEFAULT_PURPOSE);
        let qr_base64 = qr_png_base64(&state, &link).await?;

        let info = DonationInfo {
            user_id: user.id,
            donor_name: donor_name.clone(),
            donor_email: donor_email.clone(),
            donor_upi: form.upi_id.unwrap_or_default(),
            amount,
        };
        session.insert(DONATION_INFO_KEY, &info).await?;

        return Ok(Json(json!({
            "status": "success",
            "qr_base64": qr_base64,
            "upi_url": link,
            "amount": amount,
            "donor_name": donor_name,
            "donor_email": donor_email,
        })));
    }

    // Non-UPI methods record the donation immediately.
    let inserted: Vec<Value> = store
        .table("donations")
        .insert(&json!({
            "user_id": user.id,
            "amount": amount,
            "method": form.payment_method,
            "donor_name": donor_name,
            "donor_email": donor_email,
            "status": "completed",
        }))
        .await?;

    if inserted.is_empty() {
        return Ok(Json(json!({
            "status": "danger",
            "message": "Error processing donation.",
        })));
    }
    Ok(Json(json!({
        "status": "success",
        "message": "Thank you for your donation!",
    })))
}

async fn donate_success(session: Session) -> Result<Json<Value>, AppError> {
    let donor_name = session
        .get::<DonationInfo>(DONATION_INFO_KEY)
        .await?
        .map(|info| info.donor_name);
    Ok(Json(json!({ "donor_name": donor_name })))
}

/// The donor says they paid: pop the parked details and record the
/// donation as successful.
async fn donate_confirm(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, AppError> {
    let Some(info) = session.remove::<DonationInfo>(DONATION_INFO_KEY).await? else {
        return Ok(Json(json!({
            "status": "danger",
            "message": "No donation found to confirm.",
        })));
    };

    state
        .store()?
        .table("donations")
        .insert::<_, Value>(&json!({
            "user_id": info.user_id,
            "amount": info.amount,
            "method": "upi",
            "donor_name": info.donor_name,
            "donor_email": info.donor_email,
            "upi_id": info.donor_upi,
            "status": "success",
        }))
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Payment recorded! Thank you for donating",
    })))
}

async fn create_donation_qr(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<QrRequest>,
) -> Result<Json<Value>, AppError> {
    if !state.config.is_upi_configured() {
        return Err(AppError::ConfigError(
            "UPI collection is not configured".to_string(),
        ));
    }
    let store = state.store()?;

    let donor_name = req.donor_name.unwrap_or_else(|| user.name.clone());
    let donor_email = req
        .donor_email
        .or_else(|| user.email.clone())
        .unwrap_or_default();

    let link = upi_link(
        &state.config.upi_id,
        &state.config.upi_payee_name,
        req.amount,
        DEFAULT_PURPOSE,
    );
    let qr_base64 = qr_png_base64(&state, &link).await?;

    let inserted: Vec<Value> = store
        .table("donations")
        .insert(&json!({
            "user_id": user.id,
            "amount": req.amount,
            "donor_name": donor_name,
            "donor_email": donor_email,
            "upi_id": state.config.upi_id,
            "upi_url": link,
            "status": "pending",
            "method": "upi",
        }))
        .await?;
    let transaction_id = inserted
        .first()
        .and_then(|r| r.get("id"))
        .and_then(Value::as_i64);

    Ok(Json(json!({
        "upi_id": state.config.upi_id,
        "amount": req.amount,
        "qr_code": qr_base64,
        "upi_url": link,
        "purpose": DEFAULT_PURPOSE,
        "donor_name": donor_name,
        "donor_email": donor_email,
        "transaction_id": transaction_id,
    })))
}

/// Mark a donation verified. The code is treated as the UPI
/// reference/UTR; no format validation so manual reconciliation stays
/// easy.
async fn verify_donation(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Value>, AppError> {
    mark_verified(
        state.store()?,
        req.transaction_id,
        req.verification_code.as_deref(),
        req.sender_upi_id.as_deref(),
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Payment verified successfully",
    })))
}

async fn mark_verified(
    store: &Store,
    transaction_id: i64,
    reference: Option<&str>,
    sender_upi: Option<&str>,
) -> Result<(), AppError> {
    let mut patch = serde_json::Map::new();
    patch.insert("status".to_string(), json!("verified"));
    patch.insert("verified_at".to_string(), json!(chrono::Utc::now().to_rfc3339()));
    if let Some(reference) = reference {
        patch.insert("upi_reference".to_string(), json!(reference));
    }
    if let Some(sender) = sender_upi {
        patch.insert("sender_upi_id".to_string(), json!(sender));
    }

    store
        .table("donations")
        .eq("id", transaction_id)
        .update::<_, Value>(&Value::Object(patch))
        .await?;
    Ok(())
}

/// Promote the caller's latest pending donation to success (static-QR
/// flow has no webhook to do it for us).
async fn mark_donation_paid(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    let store = state.store()?;

    let latest: Option<Donation> = store
        .table("donations")
        .select("id")
        .eq("user_id", user.id)
        .eq("status", "pending")
        .order("created_at", true)
        .fetch_optional()
        .await?;

    let Some(latest) = latest else {
        return Ok(Json(json!({
            "status": "warning",
            "message": "No pending donation found to mark as paid.",
        })));
    };

    store
        .table("donations")
        .eq("id", latest.id)
        .update::<_, Value>(&json!({
            "status": "success",
            "updated_at": chrono::Utc::now().to_rfc3339(),
        }))
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Payment marked as successful! Thank you.",
    })))
}

async fn donation_status(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(transaction_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let row: Option<Donation> = state
        .store()?
        .table("donations")
        .select("id, status, amount, amount_paid")
        .eq("id", transaction_id)
        .fetch_optional()
        .await?;

    let Some(row) = row else {
        return Err(AppError::NotFound("Donation".to_string()));
    };

    let status = row.status.clone().unwrap_or_default().to_lowercase();
    let is_success = matches!(status.as_str(), "verified" | "success" | "completed");
    Ok(Json(json!({
        "success": true,
        "status": status,
        "is_success": is_success,
        "amount": row.amount,
        "amount_paid": row.amount_paid,
    })))
}

async fn pending_donations(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    let rows: Vec<Donation> = state
        .store()?
        .table("donations")
        .select("*")
        .eq("status", "pending")
        .order("created_at", true)
        .fetch()
        .await?;
    Ok(Json(json!({ "donations": rows })))
}

#[derive(Debug, Deserialize)]
struct AdminVerifyForm {
    #[serde(default)]
    verification_code: Option<String>,
}

async fn admin_verify_donation(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(transaction_id): Path<i64>,
    Form(form): Form<AdminVerifyForm>,
) -> Result<Json<Value>, AppError> {
    mark_verified(
        state.store()?,
        transaction_id,
        form.verification_code.as_deref(),
        None,
    )
    .await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Donation verified successfully!",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upi_link_encodes_payee_and_purpose() {
        let link = upi_link("relief@bank", "Relief Fund", 250.0, "Disaster Relief Donation");
        assert!(link.starts_with("upi://pay?pa=relief@bank"));
        assert!(link.contains("pn=Relief+Fund"));
        assert!(link.contains("am=250"));
        assert!(link.contains("cu=INR"));
        assert!(link.contains("tn=Disaster+Relief+Donation"));
    }
}
