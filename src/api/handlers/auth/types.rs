//! Request/response types for auth endpoints.
//!
//! Every endpoint answers with the same envelope: `success`, a human-readable
//! `message`, and an optional `data` payload. `UserView` is the only user
//! shape that crosses the wire; secrets and recovery codes never leave the
//! store layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::store::UserRecord;

/// Uniform response envelope.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn fail_with(message: impl Into<String>, data: T) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Some(data),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenData {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Caller-facing projection of a user record.
///
/// Built only through [`UserView::from`], so new columns on the record stay
/// private until deliberately added here.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub status: String,
    pub photo_url: Option<String>,
    pub two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserView {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            email: record.email.clone(),
            status: record.status.as_str().to_string(),
            photo_url: record.photo_url.clone(),
            two_factor_enabled: record.two_factor_confirmed_at.is_some(),
            created_at: record.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginData {
    pub user: UserView,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorCodeRequest {
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EnableTwoFactorData {
    pub secret: String,
    pub qr_code_url: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ConfirmTwoFactorData {
    pub recovery_codes: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LockData {
    pub lock_session: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LockStatusData {
    pub is_locked: bool,
    pub lock_session: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UnlockRequest {
    pub lock_session: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordUpdateRequest {
    pub current_password: String,
    pub password: String,
    pub password_confirmation: String,
}
