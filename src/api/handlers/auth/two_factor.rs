//! Two-factor enrollment and verification.
//!
//! Flow overview:
//! 1) `enable` mints a secret and parks it as a pending enrollment; nothing
//!    is persisted yet.
//! 2) `confirm` proves possession of the authenticator with a live code, then
//!    persists secret + recovery codes + confirmation stamp in one write. The
//!    recovery codes are shown exactly once, in this response.
//! 3) `verify` answers a challenge with either a TOTP code or a single-use
//!    recovery code.
//! 4) `disable` requires a live code and clears all persisted 2FA state.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::pending::PendingEnrollments;
use super::principal::{Principal, require_auth};
use super::state::AuthState;
use super::store::{UserRecord, UserStore};
use super::types::{
    ApiResponse, ConfirmTwoFactorData, EnableTwoFactorData, TwoFactorCodeRequest,
};
use crate::totp;
use crate::totp::recovery;

/// Two-factor failure taxonomy. The messages are the wire contract.
#[derive(Debug, Error)]
pub enum TwoFactorError {
    #[error("2FA is already enabled")]
    AlreadyEnabled,
    #[error("2FA is not enabled")]
    NotEnabled,
    #[error("Invalid session")]
    NoPendingEnrollment,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// How a challenge was answered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChallengeOutcome {
    TotpMatch,
    RecoveryMatch,
    NoMatch,
}

pub struct TwoFactorService {
    store: Arc<dyn UserStore>,
    pending: PendingEnrollments,
    issuer: String,
}

impl TwoFactorService {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, issuer: String, pending_ttl: Duration) -> Self {
        Self {
            store,
            pending: PendingEnrollments::new(pending_ttl),
            issuer,
        }
    }

    async fn load_user(&self, user_id: Uuid) -> Result<UserRecord, TwoFactorError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| TwoFactorError::Store(anyhow::anyhow!("user {user_id} not found")))
    }

    /// Begin enrollment: mint a secret and park it until confirmation.
    ///
    /// Restarting replaces the parked secret; the persisted user record is
    /// untouched until `confirm_enrollment` succeeds.
    pub async fn start_enrollment(
        &self,
        principal: &Principal,
    ) -> Result<(String, String), TwoFactorError> {
        let record = self.load_user(principal.user_id).await?;
        if record.two_factor_enabled() {
            return Err(TwoFactorError::AlreadyEnabled);
        }

        let secret = totp::generate_secret();
        let qr_code_url = totp::provisioning_url(&self.issuer, &record.email, &secret)?;
        self.pending.insert(principal.user_id, secret.clone()).await;
        Ok((secret, qr_code_url))
    }

    /// Confirm enrollment with a live code; returns the recovery batch.
    ///
    /// A wrong code leaves the pending secret parked so the user can try
    /// again with the same QR.
    pub async fn confirm_enrollment(
        &self,
        principal: &Principal,
        code: &str,
    ) -> Result<Vec<String>, TwoFactorError> {
        let record = self.load_user(principal.user_id).await?;
        if record.two_factor_enabled() {
            return Err(TwoFactorError::AlreadyEnabled);
        }

        let secret = self
            .pending
            .peek(principal.user_id)
            .await
            .ok_or(TwoFactorError::NoPendingEnrollment)?;
        if !totp::verify_code(&secret, code, totp::unix_now()) {
            return Err(TwoFactorError::InvalidCode);
        }

        let codes = recovery::generate_batch();
        self.store
            .enable_two_factor(principal.user_id, &secret, &codes)
            .await?;
        self.pending.remove(principal.user_id).await;
        Ok(codes)
    }

    /// Disable 2FA; requires a live code against the confirmed secret.
    pub async fn disable(&self, principal: &Principal, code: &str) -> Result<(), TwoFactorError> {
        let record = self.load_user(principal.user_id).await?;
        if !record.two_factor_enabled() {
            return Err(TwoFactorError::NotEnabled);
        }
        let secret = record
            .two_factor_secret
            .as_deref()
            .ok_or(TwoFactorError::NotEnabled)?;
        if !totp::verify_code(secret, code, totp::unix_now()) {
            return Err(TwoFactorError::InvalidCode);
        }
        self.store.disable_two_factor(principal.user_id).await?;
        Ok(())
    }

    /// Answer a challenge: TOTP first, then recovery-code consumption.
    pub async fn verify_challenge(
        &self,
        principal: &Principal,
        code: &str,
    ) -> Result<ChallengeOutcome, TwoFactorError> {
        let record = self.load_user(principal.user_id).await?;
        if !record.two_factor_enabled() {
            return Err(TwoFactorError::NotEnabled);
        }
        let secret = record
            .two_factor_secret
            .as_deref()
            .ok_or(TwoFactorError::NotEnabled)?;

        if totp::verify_code(secret, code, totp::unix_now()) {
            return Ok(ChallengeOutcome::TotpMatch);
        }
        if self
            .store
            .consume_recovery_code(principal.user_id, code)
            .await?
        {
            return Ok(ChallengeOutcome::RecoveryMatch);
        }
        Ok(ChallengeOutcome::NoMatch)
    }
}

fn two_factor_failure(err: &TwoFactorError) -> Response {
    match err {
        TwoFactorError::Store(inner) => {
            error!("Two-factor operation failed: {inner}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::fail("Request failed")),
            )
                .into_response()
        }
        other => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::fail(other.to_string())),
        )
            .into_response(),
    }
}

fn missing_payload() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::fail("Missing payload")),
    )
        .into_response()
}

/// Start 2FA enrollment.
#[utoipa::path(
    post,
    path = "/v1/auth/2fa/enable",
    responses(
        (status = 200, description = "Enrollment started", body = ApiResponse<EnableTwoFactorData>),
        (status = 400, description = "2FA is already enabled"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn enable(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> Response {
    let principal = match require_auth(&headers, &state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match state.two_factor().start_enrollment(&principal).await {
        Ok((secret, qr_code_url)) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "2FA enrollment started",
                EnableTwoFactorData {
                    secret,
                    qr_code_url,
                },
            )),
        )
            .into_response(),
        Err(err) => two_factor_failure(&err),
    }
}

/// Confirm enrollment with a code from the authenticator app.
#[utoipa::path(
    post,
    path = "/v1/auth/2fa/confirm",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "2FA enabled", body = ApiResponse<ConfirmTwoFactorData>),
        (status = 400, description = "Invalid session or code"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn confirm(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorCodeRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match state
        .two_factor()
        .confirm_enrollment(&principal, &request.code)
        .await
    {
        Ok(recovery_codes) => {
            info!(user_id = %principal.user_id, "2FA enabled");
            (
                StatusCode::OK,
                Json(ApiResponse::ok(
                    "2FA has been enabled",
                    ConfirmTwoFactorData { recovery_codes },
                )),
            )
                .into_response()
        }
        Err(err) => two_factor_failure(&err),
    }
}

/// Disable 2FA with a live code.
#[utoipa::path(
    post,
    path = "/v1/auth/2fa/disable",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "2FA disabled"),
        (status = 400, description = "Invalid code or 2FA not enabled"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn disable(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorCodeRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match state.two_factor().disable(&principal, &request.code).await {
        Ok(()) => {
            info!(user_id = %principal.user_id, "2FA disabled");
            (
                StatusCode::OK,
                Json(ApiResponse::<()>::ok_empty("2FA has been disabled")),
            )
                .into_response()
        }
        Err(err) => two_factor_failure(&err),
    }
}

/// Answer a 2FA challenge with a TOTP or recovery code.
#[utoipa::path(
    post,
    path = "/v1/auth/2fa/verify",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "Verification successful"),
        (status = 400, description = "Invalid verification code"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn verify(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorCodeRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match state
        .two_factor()
        .verify_challenge(&principal, &request.code)
        .await
    {
        Ok(ChallengeOutcome::TotpMatch) => (
            StatusCode::OK,
            Json(ApiResponse::<()>::ok_empty("Verification successful")),
        )
            .into_response(),
        Ok(ChallengeOutcome::RecoveryMatch) => {
            info!(user_id = %principal.user_id, "Recovery code consumed");
            (
                StatusCode::OK,
                Json(ApiResponse::<()>::ok_empty(
                    "Recovery code used successfully",
                )),
            )
                .into_response()
        }
        Ok(ChallengeOutcome::NoMatch) => {
            warn!(user_id = %principal.user_id, "2FA challenge failed");
            (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::fail("Invalid verification code")),
            )
                .into_response()
        }
        Err(err) => two_factor_failure(&err),
    }
}
