use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::repo_types::UserRecord;

/// Request body for signup. Fields are optional at the wire level so a
/// missing field becomes a validation error rather than a parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub agree_terms: Option<bool>,
    #[serde(default)]
    pub newsletter: Option<bool>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company: Option<String>,
}

impl From<&UserRecord> for PublicUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            company: user.company.clone(),
        }
    }
}

/// Profile view, adds account timestamps.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUser {
    #[serde(flatten)]
    pub user: PublicUser,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
}

impl From<&UserRecord> for ProfileUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            user: PublicUser::from(user),
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: ProfileUser,
}
