//! Registration, login, and token lifecycle endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{error, info};

use super::principal::{bearer_token, require_auth};
use super::state::AuthState;
use super::store::{CreateOutcome, NewUser, UserStatus};
use super::token::RefreshError;
use super::types::{ApiResponse, LoginData, LoginRequest, RegisterRequest, TokenData, UserView};
use super::utils::{
    MAX_NAME_LEN, MIN_PASSWORD_LEN, hash_password, is_valid_email, normalize_email,
};

const TOKEN_TYPE: &str = "bearer";

fn validation_failure(errors: Map<String, Value>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::fail_with(
            "The given data was invalid.",
            json!({ "errors": errors }),
        )),
    )
        .into_response()
}

fn push_error(errors: &mut Map<String, Value>, field: &str, message: &str) {
    let entry = errors
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(messages) = entry {
        messages.push(Value::String(message.to_string()));
    }
}

fn server_failure(context: &str, err: &anyhow::Error) -> Response {
    error!("{context}: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::fail("Request failed")),
    )
        .into_response()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::fail(message)),
    )
        .into_response()
}

fn register_errors(request: &RegisterRequest) -> Map<String, Value> {
    let mut errors = Map::new();
    if request.name.trim().is_empty() {
        push_error(&mut errors, "name", "The name field is required");
    } else if request.name.chars().count() > MAX_NAME_LEN {
        push_error(&mut errors, "name", "The name may not be greater than 255 characters");
    }
    if !is_valid_email(&normalize_email(&request.email)) {
        push_error(&mut errors, "email", "The email must be a valid email address");
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        push_error(
            &mut errors,
            "password",
            "The password must be at least 8 characters",
        );
    }
    if request.password != request.password_confirmation {
        push_error(
            &mut errors,
            "password",
            "The password confirmation does not match",
        );
    }
    errors
}

/// Create an account and hand back a bearer token.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<LoginData>),
        (status = 422, description = "Validation failed")
    ),
    tag = "auth"
)]
pub async fn register(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::fail("Missing payload")),
        )
            .into_response();
    };

    let errors = register_errors(&request);
    if !errors.is_empty() {
        return validation_failure(errors);
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => return server_failure("Failed to hash password", &err),
    };

    let outcome = state
        .store()
        .create(NewUser {
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            password_hash,
        })
        .await;

    let record = match outcome {
        Ok(CreateOutcome::Created(record)) => record,
        Ok(CreateOutcome::EmailTaken) => {
            let mut errors = Map::new();
            push_error(&mut errors, "email", "The email has already been taken");
            return validation_failure(errors);
        }
        Err(err) => return server_failure("Failed to create user", &err),
    };

    let issued = match state.tokens().issue(record.id) {
        Ok(issued) => issued,
        Err(err) => return server_failure("Failed to issue token", &err),
    };

    info!(user_id = %record.id, "User registered");
    (
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "User registered successfully",
            LoginData {
                user: UserView::from(&record),
                access_token: issued.token,
                token_type: TOKEN_TYPE.to_string(),
                expires_in: issued.expires_in,
            },
        )),
    )
        .into_response()
}

/// Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<LoginData>),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account is not active")
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::fail("Missing payload")),
        )
            .into_response();
    };

    let record = match state
        .store()
        .find_by_email(&normalize_email(&request.email))
        .await
    {
        Ok(Some(record)) => record,
        Ok(None) => return unauthorized("Invalid credentials"),
        Err(err) => return server_failure("Failed to lookup user", &err),
    };

    if !super::utils::verify_password(&request.password, &record.password_hash) {
        return unauthorized("Invalid credentials");
    }
    if record.status != UserStatus::Active {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::fail("Account is not active")),
        )
            .into_response();
    }

    let issued = match state.tokens().issue(record.id) {
        Ok(issued) => issued,
        Err(err) => return server_failure("Failed to issue token", &err),
    };

    info!(user_id = %record.id, "User logged in");
    (
        StatusCode::OK,
        Json(ApiResponse::ok(
            "Login successful",
            LoginData {
                user: UserView::from(&record),
                access_token: issued.token,
                token_type: TOKEN_TYPE.to_string(),
                expires_in: issued.expires_in,
            },
        )),
    )
        .into_response()
}

/// The authenticated user's profile.
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Authenticated user", body = ApiResponse<UserView>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn me(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> Response {
    let principal = match require_auth(&headers, &state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match state.store().find_by_id(principal.user_id).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Authenticated user", UserView::from(&record))),
        )
            .into_response(),
        Ok(None) => unauthorized("Invalid token"),
        Err(err) => server_failure("Failed to load user", &err),
    }
}

/// Invalidate the presented token.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> Response {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(err) => return unauthorized(&err.to_string()),
    };
    match state.tokens().invalidate(token).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::<()>::ok_empty("Successfully logged out")),
        )
            .into_response(),
        Err(err) => unauthorized(&err.to_string()),
    }
}

/// Trade the presented token for a fresh one.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    responses(
        (status = 200, description = "Token refreshed", body = ApiResponse<TokenData>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn refresh(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> Response {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(err) => return unauthorized(&err.to_string()),
    };
    match state.tokens().refresh(token).await {
        Ok(issued) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "Token refreshed",
                TokenData {
                    access_token: issued.token,
                    token_type: TOKEN_TYPE.to_string(),
                    expires_in: issued.expires_in,
                },
            )),
        )
            .into_response(),
        Err(RefreshError::Token(err)) => unauthorized(&err.to_string()),
        Err(RefreshError::Signing(err)) => server_failure("Failed to refresh token", &err),
    }
}

#[cfg(test)]
mod tests {
    use super::register_errors;
    use crate::api::handlers::auth::types::RegisterRequest;

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
            password_confirmation: "hunter2hunter2".to_string(),
        }
    }

    #[test]
    fn valid_registration_has_no_errors() {
        assert!(register_errors(&valid_request()).is_empty());
    }

    #[test]
    fn each_field_is_checked() {
        let mut request = valid_request();
        request.name = String::new();
        assert!(register_errors(&request).contains_key("name"));

        let mut request = valid_request();
        request.name = "x".repeat(256);
        assert!(register_errors(&request).contains_key("name"));

        let mut request = valid_request();
        request.email = "not-an-email".to_string();
        assert!(register_errors(&request).contains_key("email"));

        let mut request = valid_request();
        request.password = "short".to_string();
        request.password_confirmation = "short".to_string();
        assert!(register_errors(&request).contains_key("password"));

        let mut request = valid_request();
        request.password_confirmation = "different-password".to_string();
        assert!(register_errors(&request).contains_key("password"));
    }

    #[test]
    fn name_limit_counts_characters_not_bytes() {
        // 100 two-byte characters: 200 bytes, well under the 255-char limit.
        let mut request = valid_request();
        request.name = "å".repeat(100);
        assert!(!register_errors(&request).contains_key("name"));

        let mut request = valid_request();
        request.name = "å".repeat(256);
        assert!(register_errors(&request).contains_key("name"));
    }
}
