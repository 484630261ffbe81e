//! Hosted auth endpoints (signup, password sign-in, sign-out).
//!
//! Credentials never touch the application database; the hosted
//! service owns them and hands back the user id used as the profile
//! row's primary key.

use serde::Deserialize;
use uuid::Uuid;

use super::StoreError;

pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignupResponse {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    user: Option<AuthUser>,
}

#[derive(Debug, Deserialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub user: AuthUser,
}

impl AuthClient {
    pub(super) fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        AuthClient {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<Uuid, StoreError> {
        let resp = self
            .http
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;
        let resp = super::check(resp).await?;
        let body: SignupResponse = resp.json().await?;

        // The service returns either the user object directly or wrapped,
        // depending on whether email confirmation is enabled.
        body.id
            .or(body.user.map(|u| u.id))
            .ok_or_else(|| StoreError::Request {
                status: 200,
                body: "signup response carried no user id".to_string(),
            })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInResponse, StoreError> {
        let resp = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=password",
                self.base_url
            ))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;
        let resp = super::check(resp).await?;
        Ok(resp.json().await?)
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), StoreError> {
        let resp = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;
        super::check(resp).await?;
        Ok(())
    }
}
