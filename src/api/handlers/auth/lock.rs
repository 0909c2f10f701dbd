//! Inactivity lock sessions.
//!
//! Locking the screen parks a short-lived session id for the user; the
//! client must present that id plus the account password to unlock. Expiry
//! is never scheduled, it is computed from the creation instant whenever the
//! session is looked at. Locking again replaces the previous session.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::principal::require_auth;
use super::state::AuthState;
use super::types::{ApiResponse, LockData, LockStatusData, UnlockRequest};
use super::utils::verify_password;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum LockError {
    #[error("Lock session has expired")]
    Expired,
    #[error("Invalid credentials")]
    InvalidCredential,
}

struct LockEntry {
    session_id: Uuid,
    created_at: Instant,
}

/// One active lock session per user, fixed duration.
pub struct LockSessions {
    duration: Duration,
    entries: Mutex<HashMap<Uuid, LockEntry>>,
}

impl LockSessions {
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Start a lock session, replacing any earlier one.
    pub async fn lock(&self, user_id: Uuid) -> Uuid {
        let session_id = Uuid::new_v4();
        let mut entries = self.entries.lock().await;
        entries.insert(
            user_id,
            LockEntry {
                session_id,
                created_at: Instant::now(),
            },
        );
        session_id
    }

    /// Current lock session, if the user ever locked.
    ///
    /// A session past its duration is replaced with a fresh one: the screen
    /// stays locked, the stale id just stops being honored.
    pub async fn status(&self, user_id: Uuid) -> Option<Uuid> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&user_id)?;
        if entry.created_at.elapsed() >= self.duration {
            entry.session_id = Uuid::new_v4();
            entry.created_at = Instant::now();
        }
        Some(entry.session_id)
    }

    /// Check that `session_id` is the live session for `user_id`.
    pub async fn validate(&self, user_id: Uuid, session_id: Uuid) -> Result<(), LockError> {
        let entries = self.entries.lock().await;
        let entry = entries.get(&user_id).ok_or(LockError::Expired)?;
        if entry.session_id != session_id || entry.created_at.elapsed() >= self.duration {
            return Err(LockError::Expired);
        }
        Ok(())
    }

    /// End the lock session after a successful unlock.
    pub async fn release(&self, user_id: Uuid) {
        self.entries.lock().await.remove(&user_id);
    }
}

/// Lock the current session.
#[utoipa::path(
    post,
    path = "/v1/auth/lock",
    responses(
        (status = 200, description = "Screen locked", body = ApiResponse<LockData>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn lock(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> Response {
    let principal = match require_auth(&headers, &state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let session_id = state.locks().lock(principal.user_id).await;
    info!(user_id = %principal.user_id, "Screen locked");
    (
        StatusCode::OK,
        Json(ApiResponse::ok(
            "Screen locked",
            LockData {
                lock_session: session_id.to_string(),
            },
        )),
    )
        .into_response()
}

/// Report whether the caller is currently locked.
#[utoipa::path(
    get,
    path = "/v1/auth/lock/status",
    responses(
        (status = 200, description = "Lock status", body = ApiResponse<LockStatusData>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn lock_status(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> Response {
    let principal = match require_auth(&headers, &state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let session = state.locks().status(principal.user_id).await;
    (
        StatusCode::OK,
        Json(ApiResponse::ok(
            "Lock status",
            LockStatusData {
                is_locked: session.is_some(),
                lock_session: session.map(|id| id.to_string()),
            },
        )),
    )
        .into_response()
}

/// Unlock with the lock-session id and the account password.
#[utoipa::path(
    post,
    path = "/v1/auth/unlock",
    request_body = UnlockRequest,
    responses(
        (status = 200, description = "Unlocked", body = ApiResponse<LockStatusData>),
        (status = 400, description = "Lock session has expired"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn unlock(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<UnlockRequest>>,
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

    // The session must be live before the password is even looked at; an
    // expired lock always reports expiry.
    let session_id = Uuid::parse_str(&request.lock_session).unwrap_or_default();
    if let Err(err) = state.locks().validate(principal.user_id, session_id).await {
        return (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::fail(err.to_string())))
            .into_response();
    }

    let record = match state.store().find_by_id(principal.user_id).await {
        Ok(Some(record)) => record,
        Ok(None) | Err(_) => {
            warn!(user_id = %principal.user_id, "Failed to load user during unlock");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::fail("Unlock failed")),
            )
                .into_response();
        }
    };

    if !verify_password(&request.password, &record.password_hash) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::fail(
                LockError::InvalidCredential.to_string(),
            )),
        )
            .into_response();
    }

    state.locks().release(principal.user_id).await;
    info!(user_id = %principal.user_id, "Screen unlocked");
    (
        StatusCode::OK,
        Json(ApiResponse::ok(
            "Unlocked",
            LockStatusData {
                is_locked: false,
                lock_session: None,
            },
        )),
    )
        .into_response()
}
