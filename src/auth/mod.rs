//! Accounts, sessions and role gating.
//!
//! Credentials live in the hosted auth service; the session cookie
//! carries the signed-in user's id, display name, email and role.

pub mod handlers;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;

pub const SESSION_USER_KEY: &str = "user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Government,
    Emergency,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Government => "government",
            Role::Emergency => "emergency",
        }
    }

    pub fn parse(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            "government" => Role::Government,
            "emergency" => Role::Emergency,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}

/// Any signed-in user.
pub struct CurrentUser(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::SessionError(msg.to_string()))?;
        let user: Option<SessionUser> = session.get(SESSION_USER_KEY).await?;
        user.map(CurrentUser).ok_or(AppError::NotSignedIn)
    }
}

macro_rules! role_extractor {
    ($name:ident, $role:expr) => {
        pub struct $name(pub SessionUser);

        #[async_trait]
        impl<S> FromRequestParts<S> for $name
        where
            S: Send + Sync,
        {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &S,
            ) -> Result<Self, Self::Rejection> {
                let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
                if user.role != $role {
                    return Err(AppError::AccessDenied);
                }
                Ok($name(user))
            }
        }
    };
}

role_extractor!(AdminUser, Role::Admin);
role_extractor!(GovernmentUser, Role::Government);
role_extractor!(EmergencyUser, Role::Emergency);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_defaults_to_user() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("government"), Role::Government);
        assert_eq!(Role::parse("volunteer"), Role::User);
    }

    #[test]
    fn role_round_trips_through_serde() {
        let json = serde_json::to_string(&Role::Emergency).unwrap();
        assert_eq!(json, "\"emergency\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::Emergency);
    }
}
