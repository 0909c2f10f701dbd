//! Bearer-token authentication for protected endpoints.
//!
//! Every protected handler resolves its caller up front and passes the
//! resulting [`Principal`] down explicitly; nothing below the HTTP layer
//! reads headers or token state.

use axum::{
    Json,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use tracing::warn;
use uuid::Uuid;

use super::state::AuthState;
use super::token::AuthTokenError;
use super::types::ApiResponse;

/// The authenticated caller.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
}

fn unauthorized(err: AuthTokenError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::fail(err.to_string())),
    )
        .into_response()
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthTokenError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(AuthTokenError::Missing)
}

/// Resolve the bearer token to an active user.
///
/// On failure the caller gets a ready-made 401/403 envelope response.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Principal, Response> {
    let token = bearer_token(headers).map_err(unauthorized)?;
    let claims = state.tokens().resolve(token).await.map_err(unauthorized)?;

    let record = match state.store().find_by_id(claims.sub).await {
        Ok(Some(record)) => record,
        Ok(None) => return Err(unauthorized(AuthTokenError::Invalid)),
        Err(err) => {
            warn!("Failed to load user for token subject: {err}");
            return Err(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::fail("Authentication failed")),
                )
                    .into_response(),
            );
        }
    };

    if record.status != super::store::UserStatus::Active {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::fail("Account is not active")),
        )
            .into_response());
    }

    Ok(Principal {
        user_id: record.id,
        email: record.email,
        name: record.name,
    })
}
