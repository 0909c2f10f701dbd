//! Auth handlers and supporting modules.
//!
//! This module coordinates account lifecycle (register/login/token refresh),
//! the optional two-factor layer, and inactivity lock sessions.
//!
//! ## Token model
//!
//! Access is gated by short-lived HS256 bearer tokens. Logout and refresh
//! revoke the presented token's `jti` for the rest of its lifetime, so a
//! leaked-then-rotated token cannot be replayed against this process.
//!
//! ## Two-factor model
//!
//! Enrollment is two-phase: a started enrollment lives only in memory until
//! the user confirms with a live code, at which point secret, recovery codes,
//! and the confirmation stamp are persisted in a single write. Recovery codes
//! are stored as an ordered list and burn on use.

pub(crate) mod account;
pub(crate) mod lock;
mod pending;
pub(crate) mod principal;
pub(crate) mod profile;
mod state;
pub(crate) mod store;
mod token;
pub(crate) mod two_factor;
pub(crate) mod types;
mod utils;

pub use state::{
    AuthConfig, AuthState, DEFAULT_ISSUER, DEFAULT_LOCK_TTL_SECONDS, DEFAULT_PENDING_TTL_SECONDS,
    DEFAULT_TOKEN_TTL_SECONDS,
};
pub use store::{PgUserStore, UserStore};
pub use token::AuthTokenError;
