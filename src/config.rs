use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store_url: String,
    pub store_api_key: String,
    pub sms_api_url: String,
    pub sms_api_key: String,
    pub upi_id: String,
    pub upi_payee_name: String,
    pub weather_base_url: String,
    pub geocoder_base_url: String,
    pub overpass_base_url: String,
    pub qr_base_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub weather_poll_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // .env is optional; deployments usually set the environment directly
        let _ = dotenvy::dotenv();

        let store_url = env::var("STORE_URL").unwrap_or_default();
        let store_api_key = env::var("STORE_API_KEY").unwrap_or_default();

        let sms_api_url =
            env::var("SMS_API_URL").unwrap_or_else(|_| "https://textbelt.com/text".to_string());
        let sms_api_key = env::var("SMS_API_KEY").unwrap_or_default();

        let upi_id = env::var("UPI_ID").unwrap_or_default();
        let upi_payee_name =
            env::var("UPI_PAYEE_NAME").unwrap_or_else(|_| "Relief Fund".to_string());

        let weather_base_url =
            env::var("WEATHER_BASE_URL").unwrap_or_else(|_| "https://wttr.in".to_string());
        let geocoder_base_url = env::var("GEOCODER_BASE_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());
        let overpass_base_url = env::var("OVERPASS_BASE_URL")
            .unwrap_or_else(|_| "https://overpass-api.de/api/interpreter".to_string());
        let qr_base_url = env::var("QR_BASE_URL")
            .unwrap_or_else(|_| "https://api.qrserver.com/v1/create-qr-code/".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;
        let weather_poll_secs = env::var("WEATHER_POLL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()?;

        Ok(AppConfig {
            store_url,
            store_api_key,
            sms_api_url,
            sms_api_key,
            upi_id,
            upi_payee_name,
            weather_base_url,
            geocoder_base_url,
            overpass_base_url,
            qr_base_url,
            server_host,
            server_port,
            weather_poll_secs,
        })
    }

    pub fn is_store_configured(&self) -> bool {
        !self.store_url.is_empty() && !self.store_api_key.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.sms_api_key.is_empty()
    }

    pub fn is_upi_configured(&self) -> bool {
        !self.upi_id.is_empty()
    }
}
