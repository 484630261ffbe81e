use axum::{
    extract::{ConnectInfo, State},
    response::Json,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tower_sessions::Session;
use tracing::{info, warn};

use super::{Role, SessionUser, SESSION_USER_KEY};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::StoreError;

const SIGNUP_COOLDOWN: Duration = Duration::from_secs(60);
const SESSION_TOKEN_KEY: &str = "access_token";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/logout", get(logout))
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub fullname: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninForm {
    pub email_or_phone: String,
    pub password: String,
}

async fn signup(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Json<Value>, AppError> {
    if session
        .get::<SessionUser>(SESSION_USER_KEY)
        .await?
        .is_some()
    {
        return Ok(Json(
            json!({"status": "info", "message": "Already signed in"}),
        ));
    }

    // Per-IP cooldown between signup attempts.
    {
        let mut attempts = state.signup_attempts.lock().await;
        let now = Instant::now();
        if let Some(last) = attempts.get(&addr.ip()) {
            let elapsed = now.duration_since(*last);
            if elapsed < SIGNUP_COOLDOWN {
                let remaining = (SIGNUP_COOLDOWN - elapsed).as_secs();
                return Ok(Json(json!({
                    "status": "warning",
                    "message": format!(
                        "Too many signup attempts. Please wait {} seconds before trying again.",
                        remaining
                    ),
                })));
            }
        }
        attempts.insert(addr.ip(), now);
    }

    let store = state.store()?;
    let name = form.fullname.trim().to_string();
    let email = form.email.trim().to_lowercase();
    let phone = form.phone.trim().to_string();
    let role = Role::parse(form.role.as_deref().unwrap_or("user"));

    let metadata = json!({ "name": name, "phone": phone, "role": role.as_str() });
    let user_id = match store.auth().sign_up(&email, &form.password, metadata).await {
        Ok(id) => id,
        Err(err) => return Ok(signup_failure_message(err)),
    };

    let profile = json!({
        "id": user_id,
        "name": name,
        "email": email,
        "phone": phone,
        "place": form.place.trim(),
        "city": form.city.trim(),
        "state": form.state.trim(),
        "pincode": form.pincode.trim(),
        "role": role.as_str(),
    });
    store
        .table("users")
        .on_conflict("id")
        .upsert::<_, Value>(&profile)
        .await?;

    info!("New {} account created: {}", role.as_str(), email);
    Ok(Json(
        json!({"status": "success", "message": "Signup successful! Please log in."}),
    ))
}

fn signup_failure_message(err: StoreError) -> Json<Value> {
    let text = err.to_string().to_lowercase();
    if text.contains("rate limit") || text.contains("security purposes") {
        Json(json!({
            "status": "warning",
            "message": "Too many signup attempts. Please wait 1 minute before trying again.",
        }))
    } else if text.contains("already registered") {
        Json(json!({
            "status": "info",
            "message": "This email is already registered. Please sign in instead.",
        }))
    } else {
        warn!("Signup failed: {}", err);
        Json(json!({
            "status": "danger",
            "message": "Signup failed. Please try again later.",
        }))
    }
}

async fn signin(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SigninForm>,
) -> Result<Json<Value>, AppError> {
    if session
        .get::<SessionUser>(SESSION_USER_KEY)
        .await?
        .is_some()
    {
        return Ok(Json(
            json!({"status": "info", "message": "Already signed in"}),
        ));
    }

    let store = state.store()?;
    let handle = form.email_or_phone.trim();

    // Phone logins resolve the account email first.
    let email = if handle.contains('@') {
        handle.to_lowercase()
    } else {
        let row: Option<Value> = store
            .table("users")
            .select("email")
            .eq("phone", handle)
            .fetch_optional()
            .await?;
        match row.and_then(|r| r.get("email").and_then(|e| e.as_str()).map(str::to_lowercase)) {
            Some(email) => email,
            None => {
                return Ok(Json(json!({
                    "status": "danger",
                    "message": "Invalid credentials or user not found",
                })))
            }
        }
    };

    let signed_in = match store.auth().sign_in(&email, &form.password).await {
        Ok(resp) => resp,
        Err(err) => {
            warn!("Sign in rejected for {}: {}", email, err);
            return Ok(Json(json!({
                "status": "danger",
                "message": "Invalid credentials or user not found",
            })));
        }
    };

    let mut profile: Option<crate::store::models::User> = store
        .table("users")
        .select("id,name,email,role")
        .eq("id", signed_in.user.id)
        .fetch_optional()
        .await?;

    if profile.is_none() {
        // Backfill a minimal profile for accounts created out of band.
        let minimal = json!({
            "id": signed_in.user.id,
            "name": email.split('@').next().unwrap_or("User"),
            "email": email,
            "role": "user",
        });
        store
            .table("users")
            .on_conflict("id")
            .upsert::<_, Value>(&minimal)
            .await?;
        profile = store
            .table("users")
            .select("id,name,email,role")
            .eq("id", signed_in.user.id)
            .fetch_optional()
            .await?;
    }

    let profile = profile.ok_or_else(|| AppError::AuthError("profile missing".to_string()))?;
    let first_name = profile
        .name
        .as_deref()
        .and_then(|n| n.split_whitespace().next())
        .unwrap_or("User")
        .to_string();
    let role = Role::parse(profile.role.as_deref().unwrap_or("user"));

    let user = SessionUser {
        id: signed_in.user.id,
        name: first_name,
        email: profile.email.clone(),
        role,
    };
    session.insert(SESSION_USER_KEY, &user).await?;
    session
        .insert(SESSION_TOKEN_KEY, &signed_in.access_token)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Signed in successfully!",
        "user": { "name": user.name, "role": user.role.as_str() },
    })))
}

async fn logout(State(state): State<AppState>, session: Session) -> Result<Json<Value>, AppError> {
    if let Ok(store) = state.store() {
        if let Ok(Some(token)) = session.get::<String>(SESSION_TOKEN_KEY).await {
            // Best effort: the cookie is gone either way.
            let _ = store.auth().sign_out(&token).await;
        }
    }
    session.flush().await?;
    Ok(Json(
        json!({"status": "info", "message": "Logged out successfully!"}),
    ))
}
