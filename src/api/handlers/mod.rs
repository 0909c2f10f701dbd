//! API handlers for the auth service.
//!
//! Route handlers live here; shared auth state, stores, and token plumbing
//! are under [`auth`].

pub mod auth;
pub mod health;
pub mod root;
