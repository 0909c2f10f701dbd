//! Bearer-token issuance and resolution.
//!
//! Tokens are HS256 JWTs with `{sub, iat, exp, jti}` claims and zero clock
//! leeway. Logout and refresh revoke the old `jti` in an in-process map that
//! is pruned as entries pass their natural expiry, so the map never outgrows
//! the set of still-live tokens.

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Token failure taxonomy; each variant maps 1:1 onto a 401 body.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum AuthTokenError {
    #[error("Token not provided")]
    Missing,
    #[error("Invalid token")]
    Invalid,
    #[error("Token has expired")]
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Refresh failures: either the presented token was bad, or minting its
/// replacement failed server-side.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Token(#[from] AuthTokenError),
    #[error(transparent)]
    Signing(anyhow::Error),
}

/// A freshly minted token plus its lifetime in seconds.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

pub struct TokenGate {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
    // jti -> exp of revoked tokens still inside their lifetime.
    revoked: Mutex<HashMap<String, i64>>,
}

impl TokenGate {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Self {
        let key_bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(key_bytes),
            decoding: DecodingKey::from_secret(key_bytes),
            ttl_seconds,
            revoked: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a token for `user_id`.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue(&self, user_id: Uuid) -> Result<IssuedToken> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + self.ttl_seconds,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign token")?;
        Ok(IssuedToken {
            token,
            expires_in: self.ttl_seconds,
        })
    }

    /// Resolve a token to its claims, rejecting expired, malformed, tampered,
    /// and revoked tokens.
    pub async fn resolve(&self, token: &str) -> Result<Claims, AuthTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthTokenError::Expired,
                _ => AuthTokenError::Invalid,
            }
        })?;

        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.lock().await;
        revoked.retain(|_, exp| *exp > now);
        if revoked.contains_key(&data.claims.jti) {
            return Err(AuthTokenError::Invalid);
        }
        Ok(data.claims)
    }

    /// Revoke a token for the remainder of its lifetime.
    pub async fn invalidate(&self, token: &str) -> Result<(), AuthTokenError> {
        let claims = self.resolve(token).await?;
        let mut revoked = self.revoked.lock().await;
        revoked.insert(claims.jti, claims.exp);
        Ok(())
    }

    /// Rotate a token: the old one stops working, the caller gets a fresh one
    /// for the same subject. The replacement is minted before the old `jti`
    /// is revoked, so a signing failure leaves the presented token usable.
    pub async fn refresh(&self, token: &str) -> Result<IssuedToken, RefreshError> {
        let claims = self.resolve(token).await?;
        let issued = self.issue(claims.sub).map_err(RefreshError::Signing)?;
        let mut revoked = self.revoked.lock().await;
        revoked.insert(claims.jti, claims.exp);
        Ok(issued)
    }
}
