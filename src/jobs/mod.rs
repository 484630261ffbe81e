//! Background tasks: the SMS dispatch worker, the periodic weather
//! sweep and daily log cleanup. All run as plain tasks inside the
//! server process.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::sms::{self, SmsJob};
use crate::state::AppState;
use crate::store::models::{WeatherAlertSent, WeatherRecord};
use crate::weather::monitor;

const SMS_MAX_ATTEMPTS: u32 = 3;
const SMS_RETRY_BASE: Duration = Duration::from_secs(60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(86_400);
const SMS_LOG_RETENTION_DAYS: i64 = 30;
const ALERT_MARKER_RETENTION_DAYS: i64 = 7;

pub fn spawn_background_tasks(state: AppState, sms_rx: mpsc::UnboundedReceiver<SmsJob>) {
    {
        let state = state.clone();
        tokio::spawn(async move {
            sms_worker(state, sms_rx).await;
        });
        info!("SMS dispatch worker started");
    }

    {
        let state = state.clone();
        let poll = Duration::from_secs(state.config.weather_poll_secs.max(60));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll);
            loop {
                interval.tick().await;
                if !state.store_available() {
                    continue;
                }
                if let Err(err) = weather_sweep(&state).await {
                    error!("Weather sweep failed: {}", err);
                }
            }
        });
        info!("Weather sweep task started");
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            if !state.store_available() {
                continue;
            }
            if let Err(err) = cleanup_old_notifications(&state).await {
                error!("Notification cleanup failed: {}", err);
            }
        }
    });
    info!("Cleanup task started");
}

/// Drain the SMS queue. Failed sends are re-queued with exponential
/// backoff up to the attempt limit; every outcome is logged to the
/// store.
async fn sms_worker(state: AppState, mut rx: mpsc::UnboundedReceiver<SmsJob>) {
    while let Some(job) = rx.recv().await {
        match state.sms.send(&job.phone, &job.message).await {
            Ok(provider_id) => {
                info!("SMS sent to {}: {}", job.phone, provider_id);
                if let Ok(store) = state.store() {
                    sms::log_notification(
                        store,
                        job.user_id,
                        &job.phone,
                        &job.message,
                        job.incident_id,
                        "sent",
                        Some(&provider_id),
                        None,
                    )
                    .await;
                }
            }
            Err(err) => {
                warn!(
                    "SMS to {} failed (attempt {}): {}",
                    job.phone,
                    job.attempt + 1,
                    err
                );
                if let Ok(store) = state.store() {
                    sms::log_notification(
                        store,
                        job.user_id,
                        &job.phone,
                        &job.message,
                        job.incident_id,
                        "failed",
                        None,
                        Some(&err),
                    )
                    .await;
                }

                if job.attempt + 1 < SMS_MAX_ATTEMPTS {
                    let retry = SmsJob {
                        attempt: job.attempt + 1,
                        ..job
                    };
                    let delay = SMS_RETRY_BASE * 2u32.pow(retry.attempt - 1);
                    let queue = state.sms_queue.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = queue.send(retry);
                    });
                }
            }
        }
    }
}

/// Sweep the monitored cities, persist what came back, and text every
/// registered phone about extreme conditions not yet announced.
async fn weather_sweep(state: &AppState) -> Result<(), crate::error::AppError> {
    let observations = monitor::scan_monitored_cities(state).await;

    for observation in &observations {
        let weather_id = monitor::save_observation(state, observation, None).await?;

        if !observation.assessment.is_extreme {
            continue;
        }
        let Some(weather_id) = weather_id else {
            continue;
        };

        let store = state.store()?;
        let already_sent: Option<WeatherAlertSent> = store
            .table("weather_alerts_sent")
            .select("id")
            .eq("weather_id", weather_id)
            .fetch_optional()
            .await?;
        if already_sent.is_some() {
            continue;
        }

        let record = WeatherRecord {
            id: weather_id,
            location: Some(observation.location.clone()),
            pincode: None,
            temperature: observation.temperature,
            humidity: observation.humidity,
            wind_speed: observation.wind_speed,
            visibility: observation.visibility,
            weather_condition: Some(observation.condition.clone()),
            is_extreme: Some(true),
            weather_alert: Some(observation.assessment.message.clone()),
            coordinates: None,
            fetched_at: None,
        };
        let message = sms::weather_alert_message(&record);

        let recipients: Vec<crate::store::models::User> = store
            .table("users")
            .select("id, phone")
            .not_null("phone")
            .fetch()
            .await?;
        let mut queued = 0;
        for user in recipients {
            if let Some(phone) = user.phone {
                let _ = state.sms_queue.send(SmsJob {
                    incident_id: None,
                    user_id: Some(user.id),
                    phone,
                    message: message.clone(),
                    attempt: 0,
                });
                queued += 1;
            }
        }
        info!(
            "Queued {} weather alert SMS for {}",
            queued, observation.location
        );

        store
            .table("weather_alerts_sent")
            .insert::<_, Value>(&serde_json::json!({ "weather_id": weather_id }))
            .await?;
    }

    Ok(())
}

/// Age out SMS logs and alert-sent markers.
async fn cleanup_old_notifications(state: &AppState) -> Result<(), crate::error::AppError> {
    let store = state.store()?;

    let sms_cutoff = (Utc::now() - ChronoDuration::days(SMS_LOG_RETENTION_DAYS)).to_rfc3339();
    store
        .table("sms_notifications")
        .lt("created_at", &sms_cutoff)
        .delete()
        .await?;

    let marker_cutoff =
        (Utc::now() - ChronoDuration::days(ALERT_MARKER_RETENTION_DAYS)).to_rfc3339();
    store
        .table("weather_alerts_sent")
        .lt("sent_at", &marker_cutoff)
        .delete()
        .await?;

    info!("Old notifications cleaned up");
    Ok(())
}
