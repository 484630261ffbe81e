use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::sms::{SmsGateway, SmsJob};
use crate::store::Store;
use crate::weather::client::WeatherClient;

/// Shared application state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    store: Option<Store>,
    pub sms: SmsGateway,
    pub weather: WeatherClient,
    pub http: reqwest::Client,
    pub sms_queue: mpsc::UnboundedSender<SmsJob>,
    pub signup_attempts: Arc<Mutex<HashMap<IpAddr, Instant>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SmsJob>), Box<dyn std::error::Error>> {
        let store = if config.is_store_configured() {
            Some(Store::new(&config.store_url, &config.store_api_key)?)
        } else {
            tracing::warn!("STORE_URL or STORE_API_KEY is not set; store features disabled");
            None
        };

        let sms = SmsGateway::new(&config)?;
        let weather = WeatherClient::new(&config.weather_base_url)?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(25))
            .user_agent("relief-app/0.1")
            .build()?;

        let (sms_tx, sms_rx) = mpsc::unbounded_channel();

        Ok((
            AppState {
                config,
                store,
                sms,
                weather,
                http,
                sms_queue: sms_tx,
                signup_attempts: Arc::new(Mutex::new(HashMap::new())),
            },
            sms_rx,
        ))
    }

    /// The store, or the uniform "not configured" error the routes report.
    pub fn store(&self) -> Result<&Store, AppError> {
        self.store
            .as_ref()
            .ok_or_else(|| AppError::ConfigError("Store is not configured".to_string()))
    }

    pub fn store_available(&self) -> bool {
        self.store.is_some()
    }
}
