use axum::{
    extract::State,
    response::Json,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relief_app::announcements;
use relief_app::auth;
use relief_app::config::AppConfig;
use relief_app::dashboards;
use relief_app::geo;
use relief_app::incidents;
use relief_app::jobs;
use relief_app::ops;
use relief_app::payments;
use relief_app::state::AppState;
use relief_app::weather;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relief_app=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResQchain relief service");

    let config = AppConfig::load()?;
    info!("Configuration loaded");

    let (state, sms_rx) = AppState::new(config.clone())?;
    if state.store_available() {
        info!("Hosted store configured");
    }

    jobs::spawn_background_tasks(state.clone(), sms_rx);

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store).with_secure(false);

    let app = Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/status", get(status_endpoint))
        .merge(auth::handlers::router())
        .merge(incidents::router())
        .merge(announcements::router())
        .merge(weather::router())
        .merge(payments::router())
        .merge(geo::router())
        .merge(ops::router())
        .merge(dashboards::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(session_layer)
                .into_inner(),
        )
        .with_state(state);

    let addr = SocketAddr::new(config.server_host.parse()?, config.server_port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn home() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "relief-app",
        "description": "Disaster incident reporting and emergency coordination",
    }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "relief-app",
        "timestamp": chrono::Utc::now()
    }))
}

async fn status_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut status = serde_json::json!({
        "status": "healthy",
        "service": "relief-app",
        "timestamp": chrono::Utc::now(),
        "features": {
            "store": state.store_available(),
            "sms": state.sms.is_live(),
            "upi": state.config.is_upi_configured(),
        }
    });

    if let Ok(store) = state.store() {
        status["store"] = serde_json::json!({
            "reachable": store.ping().await
        });
    }

    Json(status)
}
