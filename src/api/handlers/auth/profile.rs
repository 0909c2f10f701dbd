//! Profile and password maintenance endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{error, info};

use super::principal::require_auth;
use super::state::AuthState;
use super::store::{ProfileChanges, ProfileOutcome, UserStatus};
use super::types::{ApiResponse, PasswordUpdateRequest, ProfileUpdateRequest, UserView};
use super::utils::{
    MAX_NAME_LEN, MIN_PASSWORD_LEN, hash_password, is_valid_email, normalize_email,
    verify_password,
};

fn validation_failure(field: &str, message: &str) -> Response {
    let mut errors = Map::new();
    errors.insert(
        field.to_string(),
        Value::Array(vec![Value::String(message.to_string())]),
    );
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::fail_with(
            "The given data was invalid.",
            json!({ "errors": errors }),
        )),
    )
        .into_response()
}

fn server_failure(context: &str, err: &anyhow::Error) -> Response {
    error!("{context}: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::fail("Request failed")),
    )
        .into_response()
}

/// Partially update name, email, status, or photo URL.
#[utoipa::path(
    put,
    path = "/v1/auth/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserView>),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Validation failed")
    ),
    tag = "auth"
)]
pub async fn update_profile(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ProfileUpdateRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::fail("Missing payload")),
        )
            .into_response();
    };

    if let Some(name) = request.name.as_deref() {
        if name.trim().is_empty() {
            return validation_failure("name", "The name field is required");
        }
        if name.chars().count() > MAX_NAME_LEN {
            return validation_failure("name", "The name may not be greater than 255 characters");
        }
    }
    let email = request.email.as_deref().map(normalize_email);
    if let Some(email) = email.as_deref() {
        if !is_valid_email(email) {
            return validation_failure("email", "The email must be a valid email address");
        }
    }
    let status = match request.status.as_deref() {
        Some(value) => match UserStatus::from_str(value) {
            Some(status) => Some(status),
            None => return validation_failure("status", "The selected status is invalid"),
        },
        None => None,
    };

    let changes = ProfileChanges {
        name: request.name.map(|name| name.trim().to_string()),
        email,
        status,
        photo_url: request.photo_url,
    };

    match state.store().update_profile(principal.user_id, changes).await {
        Ok(ProfileOutcome::Updated(record)) => {
            info!(user_id = %principal.user_id, "Profile updated");
            (
                StatusCode::OK,
                Json(ApiResponse::ok(
                    "Profile updated successfully",
                    UserView::from(&record),
                )),
            )
                .into_response()
        }
        Ok(ProfileOutcome::EmailTaken) => {
            validation_failure("email", "The email has already been taken")
        }
        Ok(ProfileOutcome::NotFound) => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::fail("Invalid token")),
        )
            .into_response(),
        Err(err) => server_failure("Failed to update profile", &err),
    }
}

/// Change the password after re-proving the current one.
#[utoipa::path(
    put,
    path = "/v1/auth/password",
    request_body = PasswordUpdateRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Validation failed")
    ),
    tag = "auth"
)]
pub async fn update_password(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordUpdateRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::fail("Missing payload")),
        )
            .into_response();
    };

    if request.password.len() < MIN_PASSWORD_LEN {
        return validation_failure("password", "The password must be at least 8 characters");
    }
    if request.password != request.password_confirmation {
        return validation_failure("password", "The password confirmation does not match");
    }

    let record = match state.store().find_by_id(principal.user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::fail("Invalid token")),
            )
                .into_response();
        }
        Err(err) => return server_failure("Failed to load user", &err),
    };

    if !verify_password(&request.current_password, &record.password_hash) {
        return validation_failure("current_password", "Current password is incorrect");
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => return server_failure("Failed to hash password", &err),
    };
    if let Err(err) = state
        .store()
        .set_password_hash(principal.user_id, &password_hash)
        .await
    {
        return server_failure("Failed to store new password", &err);
    }

    info!(user_id = %principal.user_id, "Password updated");
    (
        StatusCode::OK,
        Json(ApiResponse::<()>::ok_empty("Password updated successfully")),
    )
        .into_response()
}
