//! # Uzno Auth
//!
//! `uzno-auth` is the authentication service for the Uzno platform. It owns
//! user registration, credential login, bearer-token lifecycle, profile and
//! password management, optional two-factor authentication (TOTP plus
//! single-use recovery codes) and the inactivity lock screen the frontend
//! renders.
//!
//! ## Bearer tokens
//!
//! Login and registration issue signed bearer tokens with a fixed TTL.
//! Logout revokes the presented token; refresh rotates it. Token failures
//! are reported uniformly as 401 with a distinct message for missing,
//! invalid and expired tokens.
//!
//! ## Two-factor authentication
//!
//! Enrollment is a three-step handshake: `enable` hands out a fresh secret
//! and provisioning URL without touching the persisted user, `confirm`
//! proves possession of the authenticator and atomically activates 2FA
//! together with a batch of eight single-use recovery codes, and `disable`
//! (guarded by a current code) clears everything. Step-up verification
//! accepts either a current TOTP code or an unused recovery code; recovery
//! codes are consumed permanently.
//!
//! ## Lock sessions
//!
//! A locked client holds a short-lived server-tracked lock session; unlock
//! requires the primary credential and fails once the countdown has run out.

pub mod api;
pub mod cli;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
