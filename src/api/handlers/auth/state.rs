//! Auth state and configuration.

use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

use super::lock::LockSessions;
use super::store::UserStore;
use super::token::TokenGate;
use super::two_factor::TwoFactorService;

pub const DEFAULT_ISSUER: &str = "Uzno";
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60;
pub const DEFAULT_PENDING_TTL_SECONDS: u64 = 10 * 60;
pub const DEFAULT_LOCK_TTL_SECONDS: u64 = 30;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    issuer: String,
    token_ttl_seconds: i64,
    pending_ttl_seconds: u64,
    lock_ttl_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            issuer: DEFAULT_ISSUER.to_string(),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            pending_ttl_seconds: DEFAULT_PENDING_TTL_SECONDS,
            lock_ttl_seconds: DEFAULT_LOCK_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_pending_ttl_seconds(mut self, seconds: u64) -> Self {
        self.pending_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lock_ttl_seconds(mut self, seconds: u64) -> Self {
        self.lock_ttl_seconds = seconds;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn pending_ttl_seconds(&self) -> u64 {
        self.pending_ttl_seconds
    }

    #[must_use]
    pub fn lock_ttl_seconds(&self) -> u64 {
        self.lock_ttl_seconds
    }
}

pub struct AuthState {
    config: AuthConfig,
    store: Arc<dyn UserStore>,
    tokens: TokenGate,
    two_factor: TwoFactorService,
    locks: LockSessions,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, store: Arc<dyn UserStore>, token_secret: &SecretString) -> Self {
        let tokens = TokenGate::new(token_secret, config.token_ttl_seconds());
        let two_factor = TwoFactorService::new(
            store.clone(),
            config.issuer().to_string(),
            Duration::from_secs(config.pending_ttl_seconds()),
        );
        let locks = LockSessions::new(Duration::from_secs(config.lock_ttl_seconds()));
        Self {
            config,
            store,
            tokens,
            two_factor,
            locks,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenGate {
        &self.tokens
    }

    #[must_use]
    pub fn two_factor(&self) -> &TwoFactorService {
        &self.two_factor
    }

    #[must_use]
    pub fn locks(&self) -> &LockSessions {
        &self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, AuthState};
    use crate::api::handlers::auth::store::{UserStore, memory::MemoryUserStore};
    use secrecy::SecretString;
    use std::sync::Arc;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://uzno.dev".to_string());

        assert_eq!(config.frontend_base_url(), "https://uzno.dev");
        assert_eq!(config.issuer(), super::DEFAULT_ISSUER);
        assert_eq!(config.token_ttl_seconds(), super::DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(
            config.pending_ttl_seconds(),
            super::DEFAULT_PENDING_TTL_SECONDS
        );
        assert_eq!(config.lock_ttl_seconds(), super::DEFAULT_LOCK_TTL_SECONDS);

        let config = config
            .with_issuer("Test".to_string())
            .with_token_ttl_seconds(120)
            .with_pending_ttl_seconds(42)
            .with_lock_ttl_seconds(7);

        assert_eq!(config.issuer(), "Test");
        assert_eq!(config.token_ttl_seconds(), 120);
        assert_eq!(config.pending_ttl_seconds(), 42);
        assert_eq!(config.lock_ttl_seconds(), 7);
    }

    #[test]
    fn auth_state_wires_the_token_ttl_through() {
        let config = AuthConfig::new("https://uzno.dev".to_string()).with_token_ttl_seconds(900);
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let state = AuthState::new(config, store, &SecretString::from("test-secret"));
        assert_eq!(state.tokens().ttl_seconds(), 900);
    }
}
